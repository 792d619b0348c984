/// Human-readable size: `512B`, `3KB`, `1.5MB`, `2.0GB`, `1.1TB`.
pub fn format_size(num_bytes: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let n = num_bytes.max(0.0);
    if n < KB {
        format!("{}B", n as u64)
    } else if n < MB {
        format!("{}KB", (n / KB) as u64)
    } else if n < GB {
        format!("{:.1}MB", n / MB)
    } else if n < TB {
        format!("{:.1}GB", n / GB)
    } else {
        format!("{:.1}TB", n / TB)
    }
}
