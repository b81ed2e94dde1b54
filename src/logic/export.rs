use crate::error::{PlannerError, Result};
use crate::models::{format_money, PlanSummary};
use reqwest::Url;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const TITLE: &str = "Palm Oil Irrigation Plan";

/// Printable plan plus the admin message derived from it
#[derive(Debug, Clone)]
pub struct Receipt {
    summary: PlanSummary,
    operator: String,
}

impl Receipt {
    pub fn from_summary(summary: PlanSummary, operator: impl Into<String>) -> Self {
        Self {
            summary,
            operator: operator.into(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("palmwater-plan-{}.txt", self.summary.date.format("%Y-%m-%d"))
    }

    pub fn render_document(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();

        let _ = writeln!(out, "{}", TITLE);
        let _ = writeln!(out, "{}", "=".repeat(TITLE.len()));
        let _ = writeln!(out, "Plantation: {}", s.plantation);
        let _ = writeln!(out, "Operator:   {}", self.operator);
        let _ = writeln!(out, "Date:       {}", s.date.format("%A, %d %B %Y"));
        let _ = writeln!(
            out,
            "Rate:       {} per m²",
            format_money(&s.currency, s.cost_per_square_meter)
        );
        let _ = writeln!(out);

        if s.zones.is_empty() {
            let _ = writeln!(out, "No zones planned for this date.");
        } else {
            let _ = writeln!(
                out,
                "{:<24} {:<8} {:>12}  {:<20} {:>12}",
                "Zone", "Type", "Area (m²)", "Status", "Cost"
            );
            let _ = writeln!(out, "{}", "-".repeat(82));
            for zone in &s.zones {
                let cost = if zone.billable {
                    format_money(&s.currency, zone.cost)
                } else {
                    "-".to_string()
                };
                let _ = writeln!(
                    out,
                    "{:<24} {:<8} {:>12.2}  {:<20} {:>12}",
                    zone.label,
                    zone.kind.as_str(),
                    zone.area_square_meters,
                    zone.status(),
                    cost
                );
            }
            let _ = writeln!(out, "{}", "-".repeat(82));
        }

        let _ = writeln!(out, "Watered area: {:.2} m²", s.watered_area());
        let _ = writeln!(out, "Total Cost: {}", format_money(&s.currency, s.total));
        out
    }

    pub fn whatsapp_message(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();

        let _ = writeln!(out, "Hello Admin,");
        let _ = writeln!(out, "User: {}", self.operator);
        let _ = writeln!(out, "Plantation: {}", s.plantation);
        let _ = writeln!(out, "Date: {}", s.date.format("%Y-%m-%d"));

        let mut watered = s.billable_zones().peekable();
        if watered.peek().is_none() {
            let _ = writeln!(out, "No zones scheduled for watering.");
        }
        for zone in watered {
            let _ = writeln!(
                out,
                "{}: {:.2} m2 - {}",
                zone.label,
                zone.area_square_meters,
                format_money(&s.currency, zone.cost)
            );
        }
        for zone in s.zones.iter().filter(|z| z.rain_blocked) {
            let _ = writeln!(out, "{}: rain expected, not watered", zone.label);
        }

        let _ = write!(out, "Total Cost: {}", format_money(&s.currency, s.total));
        out
    }

    /// `https://wa.me/<phone>?text=<message>`. Non-digits in `phone` are ignored.
    pub fn whatsapp_link(&self, phone: &str) -> Result<String> {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(PlannerError::Config(format!(
                "WhatsApp phone number '{}' has no digits",
                phone
            )));
        }

        let url = Url::parse_with_params(
            &format!("https://wa.me/{}", digits),
            &[("text", self.whatsapp_message())],
        )
        .map_err(|e| PlannerError::InvalidData(format!("bad WhatsApp link: {}", e)))?;

        // Form encoding turns spaces into '+'; a literal '+' is already %2B
        Ok(url.as_str().replace('+', "%20"))
    }

    /// Write the document into `dir` and return the file path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        std::fs::write(&path, self.render_document())?;
        tracing::info!(path = %path.display(), "Receipt written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ShapeKind, ZoneSummary};
    use chrono::NaiveDate;

    fn zone(label: &str, kind: ShapeKind, area: f64, watering: bool, rain: bool) -> ZoneSummary {
        ZoneSummary {
            label: label.to_string(),
            kind,
            area_square_meters: area,
            cost: area * 0.05,
            rain_blocked: rain,
            watering_enabled: watering,
            billable: watering && !rain,
        }
    }

    fn receipt() -> Receipt {
        let zones = vec![
            zone("Plantation Area 1", ShapeKind::Polygon, 10_000.0, true, false),
            zone("Plantation Area 2", ShapeKind::Circle, 7853.98, false, true),
            zone("Plantation Area 3", ShapeKind::Polygon, 2_000.0, false, false),
        ];
        Receipt::from_summary(
            PlanSummary {
                date: NaiveDate::from_ymd_opt(2026, 10, 16).unwrap(),
                plantation: "Ladang Sungai Buloh".into(),
                currency: "RM".into(),
                cost_per_square_meter: 0.05,
                zones,
                total: 500.0,
            },
            "Aminah Rahman",
        )
    }

    #[test]
    fn document_lists_every_zone_and_total() {
        let doc = receipt().render_document();

        assert!(doc.starts_with("Palm Oil Irrigation Plan\n"));
        assert!(doc.contains("Operator:   Aminah Rahman"));
        assert!(doc.contains("Friday, 16 October 2026"));
        assert!(doc.contains("Plantation Area 1"));
        assert!(doc.contains("RM500.00"));
        assert!(doc.contains("Rain - no watering"));
        assert!(doc.contains("Not watered"));
        assert!(doc.contains("Watered area: 10000.00 m²"));
        assert!(doc.trim_end().ends_with("Total Cost: RM500.00"));
    }

    #[test]
    fn message_mentions_watered_and_rain_zones_only() {
        let msg = receipt().whatsapp_message();

        assert!(msg.starts_with("Hello Admin,\nUser: Aminah Rahman\n"));
        assert!(msg.contains("Plantation Area 1: 10000.00 m2 - RM500.00"));
        assert!(msg.contains("Plantation Area 2: rain expected, not watered"));
        assert!(!msg.contains("Plantation Area 3"));
        assert!(msg.ends_with("Total Cost: RM500.00"));
    }

    #[test]
    fn whatsapp_link_is_percent_encoded() {
        let link = receipt().whatsapp_link("+60 12-345 6789").unwrap();

        assert!(link.starts_with("https://wa.me/60123456789?text=Hello%20Admin%2C%0AUser%3A%20Aminah%20Rahman"));
        assert!(!link.contains('+'));
        assert!(!link.contains(' '));
    }

    #[test]
    fn whatsapp_link_needs_a_phone_number() {
        assert!(matches!(
            receipt().whatsapp_link("n/a"),
            Err(PlannerError::Config(_))
        ));
    }

    #[test]
    fn write_to_creates_dated_file() {
        let dir = std::env::temp_dir().join(format!("palmwater-export-{}", uuid::Uuid::new_v4()));
        let receipt = receipt();

        let path = receipt.write_to(&dir).unwrap();
        assert_eq!(path.file_name().unwrap(), "palmwater-plan-2026-10-16.txt");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), receipt.render_document());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
