use chrono::Local;
use csv::Writer;
use nalgebra::DVector;
use simplelog::*;
use std::fs::File;
use std::io;

/// level names accepted by `init_logger`: "debug", "info", "warn", "error", "off"
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level {
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        "off" => Some(LevelFilter::Off),
        _ => None,
    }
}

/// name of a log file stamped with the current date and time
pub fn log_file_name(prefix: &str) -> String {
    let date_and_time = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("{}_{}.log", prefix, date_and_time)
}

/// console logger plus (optionally) a file logger.
/// Unknown level names fall back to "info". Initialising twice is harmless:
/// the second call is ignored.
pub fn init_logger(level: &str, log_file: Option<&str>) -> io::Result<()> {
    let level = parse_level(level).unwrap_or(LevelFilter::Info);
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(name) = log_file {
        loggers.push(WriteLogger::new(level, Config::default(), File::create(name)?));
    }
    let _ = CombinedLogger::init(loggers);
    Ok(())
}

/// writes columns x, y0, y1, ... (one row per entry of `x`)
pub fn save_history_to_csv(
    x: &[f64],
    y: &[DVector<f64>],
    arg: &str,
    filename: &str,
) -> io::Result<()> {
    let file = File::create(filename)?;
    let mut writer = Writer::from_writer(file);
    let ndim = y.first().map(|v| v.len()).unwrap_or(0);
    let mut headers = vec![arg.to_string()];
    headers.extend((0..ndim).map(|i| format!("y{}", i)));
    writer.write_record(&headers)?;
    for (xi, yi) in x.iter().zip(y.iter()) {
        let mut row_data = Vec::with_capacity(ndim + 1);
        row_data.push(xi.to_string());
        row_data.extend(yi.iter().map(|&val| val.to_string()));
        writer.write_record(&row_data)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_levels_and_names() {
        assert_eq!(parse_level("warn"), Some(LevelFilter::Warn));
        assert_eq!(parse_level("loud"), None);
        let name = log_file_name("radau5");
        assert!(name.starts_with("radau5_") && name.ends_with(".log"));
    }

    #[test]
    fn test_save_history_to_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.csv");
        let x = vec![0.0, 0.5];
        let y = vec![
            DVector::from_vec(vec![1.0, 2.0]),
            DVector::from_vec(vec![1.5, -2.0]),
        ];
        save_history_to_csv(&x, &y, "t", path.to_str().unwrap()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["t,y0,y1", "0,1,2", "0.5,1.5,-2"]);
    }
}
