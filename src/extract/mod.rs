//! Best-effort structured-content extraction from uploaded documents.
//!
//! This sits outside the transfer core as a pluggable collaborator. The
//! contract is deliberately loose: extraction may return partial or empty
//! fields but must never fail, so file handling always succeeds even when a
//! document is unreadable. The default implementation scrapes lossily
//! decoded text with regex heuristics tuned for Swedish medical records
//! (journal sections, doctor names) and health exports (heart rate, blood
//! pressure).

use regex::Regex;
use serde::Serialize;

/// Structured fields pulled out of one document. Everything optional.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    pub title: String,
    pub doctor: Option<String>,
    pub date: Option<String>,
    pub summary: String,
    pub sections: DocumentSections,
    pub metrics: HealthMetrics,
}

/// Recognized journal sections.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentSections {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anamnes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedomning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rekommendationer: Option<String>,
}

impl DocumentSections {
    pub fn is_empty(&self) -> bool {
        self.anamnes.is_none()
            && self.status.is_none()
            && self.bedomning.is_none()
            && self.rekommendationer.is_none()
    }

    fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.anamnes.is_some() {
            labels.push("Anamnes");
        }
        if self.status.is_some() {
            labels.push("Status");
        }
        if self.bedomning.is_some() {
            labels.push("Bedömning");
        }
        if self.rekommendationer.is_some() {
            labels.push("Rekommendationer");
        }
        labels
    }
}

/// Heart-rate and blood-pressure readings found in spreadsheet exports.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systolic_bp: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diastolic_bp: Option<u32>,
}

/// Content-extraction seam for the HTTP layer.
pub trait ContentExtractor: Send + Sync {
    /// Extract whatever can be found; never fails. `name` seeds the
    /// fallback title when the bytes yield nothing usable.
    fn extract(&self, name: &str, bytes: &[u8], mimetype: &str) -> ExtractedContent;
}

/// Regex-heuristic extractor, the default collaborator.
pub struct HeuristicExtractor {
    doctor: Vec<Regex>,
    date: Vec<Regex>,
    heart_rate: Regex,
    bp_pair: Regex,
    section_starts: Vec<(Section, Regex)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Anamnes,
    Status,
    Bedomning,
    Rekommendationer,
}

impl Default for HeuristicExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicExtractor {
    pub fn new() -> Self {
        // Unwraps are on literal patterns checked by the pattern tests.
        Self {
            doctor: vec![
                Regex::new(r"Dr\.?\s+([A-ZÅÄÖ][a-zåäö]+\s+[A-ZÅÄÖ][a-zåäö]+)").unwrap(),
                Regex::new(r"(?i)läkare:\s*([A-ZÅÄÖ][a-zåäö]+\s+[A-ZÅÄÖ][a-zåäö]+)").unwrap(),
                Regex::new(r"([A-ZÅÄÖ][a-zåäö]+(?:\s+[A-ZÅÄÖ][a-zåäö]+)+)\s*\(Läkare\)").unwrap(),
            ],
            date: vec![
                Regex::new(r"(\d{4}-\d{2}-\d{2})").unwrap(),
                Regex::new(r"(\d{2}/\d{2}/\d{4})").unwrap(),
                Regex::new(r"(\d{2}\.\d{2}\.\d{4})").unwrap(),
            ],
            heart_rate: Regex::new(
                r"(?i)(?:hjärtfrekvens|heart[\s-]*rate|puls|pulse|\bhr\b)\D{0,20}?(\d{2,3})",
            )
            .unwrap(),
            bp_pair: Regex::new(r"(\d{2,3})\s*/\s*(\d{2,3})").unwrap(),
            section_starts: vec![
                (
                    Section::Anamnes,
                    Regex::new(r"(?i)\b(?:anamnes|nybesök|historik)\b").unwrap(),
                ),
                (
                    Section::Status,
                    Regex::new(r"(?i)\b(?:status|klinisk undersökning|fynd)\b").unwrap(),
                ),
                (
                    Section::Bedomning,
                    Regex::new(r"(?i)\b(?:bedömning|diagnos|utlåtande)\b").unwrap(),
                ),
                (
                    Section::Rekommendationer,
                    Regex::new(r"(?i)\b(?:rekommendation(?:er)?|uppföljning|behandling)\b")
                        .unwrap(),
                ),
            ],
        }
    }

    fn find_title(&self, text: &str, name: &str) -> String {
        text.lines()
            .map(str::trim)
            .find(|line| {
                line.len() > 5
                    && line.len() < 100
                    && line.chars().filter(|c| c.is_alphabetic()).count() > 3
            })
            .map(str::to_string)
            .unwrap_or_else(|| format!("Importerat dokument: {}", name))
    }

    fn find_doctor(&self, text: &str) -> Option<String> {
        for pattern in &self.doctor {
            if let Some(caps) = pattern.captures(text) {
                return Some(format!("Dr. {}", caps[1].trim()));
            }
        }
        None
    }

    fn find_date(&self, text: &str) -> Option<String> {
        self.date
            .iter()
            .find_map(|p| p.captures(text).map(|caps| caps[1].to_string()))
    }

    fn find_sections(&self, text: &str) -> DocumentSections {
        // Locate each section's first marker, then slice up to the next
        // marker (or end of text). Overlapping markers keep the earliest.
        let mut marks: Vec<(usize, usize, Section)> = Vec::new();
        for (section, pattern) in &self.section_starts {
            if let Some(m) = pattern.find(text) {
                marks.push((m.start(), m.end(), *section));
            }
        }
        marks.sort_by_key(|(start, _, _)| *start);

        let mut sections = DocumentSections::default();
        for (i, (_, body_start, section)) in marks.iter().enumerate() {
            let end = marks
                .get(i + 1)
                .map(|(next_start, _, _)| *next_start)
                .unwrap_or(text.len());
            if *body_start >= end {
                continue;
            }
            let body = text[*body_start..end].trim();
            if body.len() < 10 {
                continue;
            }
            let body = Some(body.to_string());
            match section {
                Section::Anamnes => sections.anamnes = body,
                Section::Status => sections.status = body,
                Section::Bedomning => sections.bedomning = body,
                Section::Rekommendationer => sections.rekommendationer = body,
            }
        }
        sections
    }

    fn find_metrics(&self, text: &str) -> HealthMetrics {
        let mut metrics = HealthMetrics::default();

        if let Some(caps) = self.heart_rate.captures(text) {
            if let Ok(value) = caps[1].parse::<u32>() {
                // Plausibility window for a human heart rate.
                if (30..=300).contains(&value) {
                    metrics.heart_rate = Some(value);
                }
            }
        }

        for caps in self.bp_pair.captures_iter(text) {
            let (Ok(sys), Ok(dia)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
                continue;
            };
            if (60..=260).contains(&sys) && (30..=200).contains(&dia) && sys > dia {
                metrics.systolic_bp = Some(sys);
                metrics.diastolic_bp = Some(dia);
                break;
            }
        }

        metrics
    }
}

impl ContentExtractor for HeuristicExtractor {
    fn extract(&self, name: &str, bytes: &[u8], mimetype: &str) -> ExtractedContent {
        let text = String::from_utf8_lossy(bytes);
        let sections = self.find_sections(&text);
        let metrics = self.find_metrics(&text);

        let summary = if sections.is_empty() {
            let clean: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if clean.trim().is_empty() {
                format!("Kunde inte läsa innehållet i {} ({})", name, mimetype)
            } else {
                let mut end = clean.len().min(200);
                while !clean.is_char_boundary(end) {
                    end -= 1;
                }
                clean[..end].to_string()
            }
        } else {
            format!("Innehåller: {}", sections.labels().join(", "))
        };

        ExtractedContent {
            title: self.find_title(&text, name),
            doctor: self.find_doctor(&text),
            date: self.find_date(&text),
            summary,
            sections,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> ExtractedContent {
        HeuristicExtractor::new().extract("journal.pdf", text.as_bytes(), "application/pdf")
    }

    #[test]
    fn finds_doctor_and_date() {
        let content = extract(
            "Journalanteckning 2024-03-18\nAntecknad av Anna Lindqvist (Läkare)\nAnamnes: patienten uppger yrsel sedan två veckor.",
        );
        assert_eq!(content.doctor.as_deref(), Some("Dr. Anna Lindqvist"));
        assert_eq!(content.date.as_deref(), Some("2024-03-18"));
    }

    #[test]
    fn splits_sections_in_order() {
        let content = extract(
            "Anamnes patienten söker för långvarig hosta och trötthet.\n\
             Status gott och opåverkat allmäntillstånd, normala andningsljud.\n\
             Bedömning sannolikt postviral hosta utan alarmsymtom.\n\
             Rekommendationer åter vid behov, uppföljning om fyra veckor.",
        );
        assert!(content.sections.anamnes.is_some());
        assert!(content.sections.status.is_some());
        assert!(content.sections.bedomning.is_some());
        assert!(content.sections.rekommendationer.is_some());
        assert!(content.summary.starts_with("Innehåller:"));
    }

    #[test]
    fn reads_heart_rate_and_blood_pressure() {
        let content = extract("Vilopuls 62 bpm\nBlodtryck 120/80 mmHg uppmätt på morgonen");
        assert_eq!(content.metrics.heart_rate, Some(62));
        assert_eq!(content.metrics.systolic_bp, Some(120));
        assert_eq!(content.metrics.diastolic_bp, Some(80));
    }

    #[test]
    fn rejects_implausible_readings() {
        let content = extract("puls 999\ntryck 500/400");
        assert_eq!(content.metrics.heart_rate, None);
        assert_eq!(content.metrics.systolic_bp, None);
    }

    #[test]
    fn unreadable_bytes_degrade_to_placeholder() {
        let content = HeuristicExtractor::new().extract(
            "scan.pdf",
            &[0u8, 159, 146, 150],
            "application/pdf",
        );
        assert!(!content.title.is_empty());
        assert!(!content.summary.is_empty());
    }
}
