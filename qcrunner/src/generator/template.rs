//! Text layouts of the survey file families written by the synthetic generator.

use chrono::NaiveDateTime;

/// Width of a primary shot record including flags and dither.
const SPS_WIDTH: usize = 107;

/// Values placed into one fixed-width `S` record.
pub struct SpsRecord<'a> {
    pub line: &'a str,
    pub sequence: u32,
    pub shot_point: i64,
    pub point_code: &'a str,
    pub average_depth: f64,
    pub water_depth: f64,
    pub easting: f64,
    pub northing: f64,
    pub timestamp: NaiveDateTime,
    /// Five recorded flag digits; a space leaves a digit blank.
    pub flags: &'a str,
    pub dither_ms: Option<i32>,
}

pub fn sps_header(line: &str, sequence: u32) -> String {
    format!(
        "H00 SPS format version            SPS V2.1\n\
         H01 Line name / sequence          {} / {}\n\
         H26 Synthetic survey line written by qcrunner\n",
        line, sequence
    )
}

pub fn sps_record(record: &SpsRecord<'_>) -> String {
    let mut bytes = vec![b' '; SPS_WIDTH];
    let mut put = |offset: usize, text: &str| {
        let end = (offset + text.len()).min(SPS_WIDTH);
        bytes[offset..end].copy_from_slice(&text.as_bytes()[..end - offset]);
    };
    put(0, "S");
    put(1, &format!("{:<10}", record.line));
    put(11, &format!("{:>10}", record.shot_point));
    put(24, &format!("{:<2}", record.point_code));
    put(30, &format!("{:>4.1}", record.average_depth));
    put(40, &format!("{:>6.1}", record.water_depth));
    put(46, &format!("{:>9.1}", record.easting));
    put(55, &format!("{:>10.1}", record.northing));
    put(71, &record.timestamp.format("%j%H%M%S").to_string());
    put(87, &format!("{:>5}", record.sequence));
    put(95, &record.timestamp.format("%y").to_string());
    put(97, record.flags);
    if let Some(dither) = record.dither_ms {
        put(102, &format!("{:>5}", dither));
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn comparison_preamble(line: &str) -> String {
    format!("SPS comparison export\nLine,{}\n\n", line)
}

pub const COMPARISON_HEADER: &str = "Code,Line,Shot,Radial (m),Crossline (m),Inline (m)";

pub const GUN_DATA_PREAMBLE: &str =
    "GUN CONTROLLER EXPORT\nProject: synthetic\nUnits: ms, m, psi, cu.in\n\n";

pub fn report_depth_sensor(module: u16, index: u16) -> String {
    format!("SSTGM{}D{}_DPT (P) Shot Event m", module, index)
}

pub fn report_pressure_sensor(module: u16, index: u16) -> String {
    format!("SSTGM{}P{}_PRS (P) Shot Event", module, index)
}

pub fn report_sma(array: u16) -> String {
    format!("Gunarray{} SMA m", array)
}

pub fn report_separation(source: u8) -> String {
    format!(
        "SOURCE SSTG{} towed by SST String 1 - 2 Crossline Separation All Shots",
        source
    )
}

pub fn report_cos(a: u8, b: u8) -> String {
    format!("Gunarray30{}-Gunarray30{} Position m", a, b)
}

pub const REPORT_AUTOFIRES: &str = "Raw: SST_GUN1 #Autofires";

pub fn gun_timing(string: u16, gun: u16) -> String {
    format!("String_{}-Cluster_1-Gun_{}", string, gun)
}

pub fn source_timing_page(page: usize) -> String {
    format!("# source controller summary\nPage {}\nShot\tShot Time (s) sec\tMode\n", page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn sps_record_places_columns_at_fixed_offsets() {
        let timestamp = NaiveDate::from_yo_opt(2024, 182)
            .unwrap()
            .and_hms_opt(12, 30, 15)
            .unwrap();
        let line = sps_record(&SpsRecord {
            line: "SYN001",
            sequence: 1001,
            shot_point: 1001,
            point_code: "A1",
            average_depth: 7.0,
            water_depth: 85.2,
            easting: 612345.1,
            northing: 6712345.2,
            timestamp,
            flags: "00000",
            dither_ms: Some(-58),
        });
        assert_eq!(line.len(), SPS_WIDTH);
        assert_eq!(&line[11..21], "      1001");
        assert_eq!(&line[71..80], "182123015");
        assert_eq!(&line[95..97], "24");
        assert_eq!(&line[102..107], "  -58");
    }
}
