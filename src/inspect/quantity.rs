//! Kubernetes resource quantity parsing and formatting

const KI: u64 = 1024;

/// Parse a memory quantity ("2Gi", "512M", "1.5Gi", "1e9") to bytes
pub fn parse_memory(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let binary = [
        ("Ki", KI),
        ("Mi", KI.pow(2)),
        ("Gi", KI.pow(3)),
        ("Ti", KI.pow(4)),
        ("Pi", KI.pow(5)),
        ("Ei", KI.pow(6)),
    ];
    for (suffix, factor) in binary {
        if let Some(num) = s.strip_suffix(suffix) {
            return scale(num, factor as f64);
        }
    }

    let decimal = [
        ('k', 1e3),
        ('K', 1e3),
        ('M', 1e6),
        ('G', 1e9),
        ('T', 1e12),
        ('P', 1e15),
        ('E', 1e18),
    ];
    for (suffix, factor) in decimal {
        if let Some(num) = s.strip_suffix(suffix) {
            return scale(num, factor);
        }
    }

    // Millibytes are legal but never meaningful for requests
    if let Some(num) = s.strip_suffix('m') {
        return scale(num, 1e-3);
    }

    scale(s, 1.0)
}

/// Parse a CPU quantity ("500m", "2", "0.25") to millicores
pub fn parse_cpu(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    match s.strip_suffix('m') {
        Some(num) => scale(num, 1.0),
        None => scale(s, 1000.0),
    }
}

fn scale(num: &str, factor: f64) -> Option<u64> {
    let value: f64 = num.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let scaled = value * factor;
    // Absorb float noise ("0.1" cores) before rounding up like the apiserver
    let whole = if (scaled - scaled.round()).abs() < 1e-6 {
        scaled.round()
    } else {
        scaled.ceil()
    };
    Some(whole as u64)
}

/// Format bytes with the largest binary suffix that represents them exactly
pub fn format_memory(bytes: u64) -> String {
    let units = [("Ei", 6), ("Pi", 5), ("Ti", 4), ("Gi", 3), ("Mi", 2), ("Ki", 1)];

    if bytes > 0 {
        for (suffix, power) in units {
            let factor = KI.pow(power);
            if bytes % factor == 0 {
                return format!("{}{}", bytes / factor, suffix);
            }
        }
    }

    bytes.to_string()
}

/// Format millicores, preferring whole cores when exact
pub fn format_cpu(millis: u64) -> String {
    if millis > 0 && millis % 1000 == 0 {
        format!("{}", millis / 1000)
    } else {
        format!("{}m", millis)
    }
}
