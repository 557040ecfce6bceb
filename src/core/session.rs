use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timed study interval as the backend reports it.
///
/// The backend has drifted field names over time (`id` vs `_id`,
/// `focusLevel` vs `focus`); serde aliases normalize them here so the rest
/// of the crate only ever sees the canonical names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudySession {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(alias = "focus", default)]
    pub focus_level: Option<u8>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<u64>,
    #[serde(default)]
    pub concepts_covered: Vec<String>,
    #[serde(default)]
    pub test_score: Option<f64>,
}

impl StudySession {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// Aggregates derived from the cached session list, recomputed on every
/// successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub total_minutes: u64,
    pub avg_focus: f64,
}

impl SessionStats {
    /// Missing durations and focus values count as zero; the average is
    /// rounded to one decimal and is 0.0 for an empty list.
    pub fn from_sessions(sessions: &[StudySession]) -> Self {
        let total_sessions = sessions.len();
        let total_minutes = sessions
            .iter()
            .map(|s| s.duration_minutes.unwrap_or(0))
            .sum();
        let avg_focus = if total_sessions == 0 {
            0.0
        } else {
            let focus_sum: u32 = sessions
                .iter()
                .map(|s| u32::from(s.focus_level.unwrap_or(0)))
                .sum();
            (f64::from(focus_sum) / total_sessions as f64 * 10.0).round() / 10.0
        };

        SessionStats {
            total_sessions,
            total_minutes,
            avg_focus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, minutes: Option<u64>, focus: Option<u8>) -> StudySession {
        StudySession {
            id: id.to_string(),
            name: None,
            subject: "math".to_string(),
            focus_level: focus,
            start_time: None,
            end_time: None,
            duration_minutes: minutes,
            concepts_covered: Vec::new(),
            test_score: None,
        }
    }

    #[test]
    fn stats_for_empty_list_are_zero() {
        let stats = SessionStats::from_sessions(&[]);
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.total_minutes, 0);
        assert_eq!(stats.avg_focus, 0.0);
    }

    #[test]
    fn stats_treat_missing_fields_as_zero() {
        let sessions = vec![
            session("a", Some(25), Some(4)),
            session("b", None, Some(5)),
            session("c", Some(50), None),
        ];
        let stats = SessionStats::from_sessions(&sessions);
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.total_minutes, 75);
        assert_eq!(stats.avg_focus, 3.0);
    }

    #[test]
    fn avg_focus_rounds_to_one_decimal() {
        // 14 / 3 = 4.666... -> 4.7
        let sessions = vec![
            session("a", None, Some(4)),
            session("b", None, Some(5)),
            session("c", None, Some(5)),
        ];
        let stats = SessionStats::from_sessions(&sessions);
        assert_eq!(stats.avg_focus, 4.7);
    }

    #[test]
    fn deserializes_drifted_field_names() {
        let raw = r#"{
            "_id": "abc123",
            "subject": "physics",
            "focus": 4,
            "durationMinutes": 30
        }"#;
        let session: StudySession = serde_json::from_str(raw).unwrap();
        assert_eq!(session.id, "abc123");
        assert_eq!(session.focus_level, Some(4));
        assert_eq!(session.duration_minutes, Some(30));
        assert!(session.is_open());
    }

    #[test]
    fn deserializes_canonical_field_names() {
        let raw = r#"{
            "id": "s-1",
            "name": "ada",
            "subject": "chemistry",
            "focusLevel": 5,
            "startTime": "2025-03-01T09:00:00Z",
            "endTime": "2025-03-01T09:45:00Z",
            "durationMinutes": 45,
            "conceptsCovered": ["stoichiometry"],
            "testScore": 92.5
        }"#;
        let session: StudySession = serde_json::from_str(raw).unwrap();
        assert_eq!(session.name.as_deref(), Some("ada"));
        assert_eq!(session.focus_level, Some(5));
        assert_eq!(session.concepts_covered, vec!["stoichiometry".to_string()]);
        assert!(!session.is_open());
    }
}
