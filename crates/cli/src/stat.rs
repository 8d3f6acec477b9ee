//! Human-readable statistics summary.

use std::collections::BTreeMap;

use textoutline_core::{
    SessionStat,
    stats::{LoadError, MismatchWarning, UsedVariant},
    variant::AXIS_DEFAULTS,
};

pub fn print_stat(stat: &SessionStat) {
    if !stat.used.is_empty() {
        println!("Used fonts:");
        let mut by_family: BTreeMap<&str, Vec<&UsedVariant>> = BTreeMap::new();
        for used in &stat.used {
            by_family.entry(&used.family).or_default().push(used);
        }
        for (family, variants) in by_family {
            let chars: usize = variants.iter().map(|v| v.chars).sum();
            println!("  '{family}': {} variants, {chars} chars", variants.len());
        }
    }
    if stat.skipped > 0 {
        println!("Skipped chars: {}", stat.skipped);
    }
    if !stat.missed.is_empty() {
        let families: Vec<String> =
            stat.missed.iter().map(|family| format!("'{family}'")).collect();
        println!("Missed families: {}", families.join(", "));
    }
    if !stat.warnings.is_empty() {
        println!("Warnings:");
        for warning in &stat.warnings {
            println!("  '{}': {}", warning.family, warning_to_string(warning));
        }
    }
    if !stat.errors.is_empty() {
        println!("Errors:");
        for error in &stat.errors {
            println!("  '{}' ({}): '{}'", error.family, error_axes(error), error.variant.source);
        }
    }
    println!("Successfully replaced {} of {} text nodes", stat.replaced, stat.total);
}

/// `requested >> provided` axis summary for a mismatch warning.
fn warning_to_string(warning: &MismatchWarning) -> String {
    let mut requested = Vec::new();
    let mut provided = Vec::new();
    for (tag, default) in AXIS_DEFAULTS {
        let asked = warning.axes.get(&tag).copied().unwrap_or(default);
        let (lo, hi) = warning.variant.axis_bounds(tag);
        let satisfied = lo <= asked && asked <= hi;
        if asked != default || !satisfied {
            requested.push(format!("{tag}={asked}"));
        }
        if lo != default || hi != default || !satisfied {
            if hi > lo {
                provided.push(format!("{tag}={lo}..{hi}"));
            } else {
                provided.push(format!("{tag}={lo}"));
            }
        }
    }
    format!("{} >> {}", requested.join(","), provided.join(","))
}

fn error_axes(error: &LoadError) -> String {
    let mut parts = Vec::new();
    for (tag, coord) in &error.variant.axes {
        let (lo, hi) = coord.bounds();
        if hi > lo {
            parts.push(format!("{tag}={lo}..{hi}"));
        } else {
            parts.push(format!("{tag}={lo}"));
        }
    }
    parts.join(",")
}
