use std::collections::BTreeMap;
use std::sync::Arc;

use sternview_types::LogEntry;

/// Pod color palette (hex, matches stern's coloring)
pub const POD_COLORS: [&str; 12] = [
    "#4ade80", // green
    "#22d3ee", // cyan
    "#60a5fa", // blue
    "#c084fc", // purple
    "#f472b6", // pink
    "#facc15", // yellow
    "#fb923c", // orange
    "#f87171", // red
    "#34d399", // emerald
    "#2dd4bf", // teal
    "#818cf8", // indigo
    "#fb7185", // rose
];

/// Polynomial string hash (`hash * 31 + codepoint`, wrapping at 32 bits)
pub fn hash_name(name: &str) -> u32 {
    name.chars()
        .fold(0i32, |hash, c| hash.wrapping_mul(31).wrapping_add(c as i32))
        .unsigned_abs()
}

/// Stable color for a pod name. Different names may share a color.
pub fn color_for(name: &str) -> &'static str {
    if name.is_empty() {
        return POD_COLORS[0];
    }
    POD_COLORS[hash_name(name) as usize % POD_COLORS.len()]
}

/// Color for every distinct pod present in `entries`
pub fn build_color_map<'a, I>(entries: I) -> BTreeMap<String, &'static str>
where
    I: IntoIterator<Item = &'a Arc<LogEntry>>,
{
    let mut map = BTreeMap::new();
    for entry in entries {
        if let Some(pod) = entry.pod.as_deref().filter(|p| !p.is_empty()) {
            map.entry(pod.to_string()).or_insert_with(|| color_for(pod));
        }
    }
    map
}
