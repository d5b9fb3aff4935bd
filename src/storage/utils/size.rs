/// Human-readable object size for `stat` output, using 1024 base and units B,K,M,G,T.
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "K", "M", "G", "T"];
    const THRESHOLD: u64 = 1024;
    if size < THRESHOLD {
        return format!("{size}B");
    }
    let mut scaled = size as f64;
    let mut unit = 0;
    while scaled >= THRESHOLD as f64 && unit < UNITS.len() - 1 {
        scaled /= THRESHOLD as f64;
        unit += 1;
    }
    format!("{scaled:.1}{}", UNITS[unit])
}
