//! Data models for matchday entities.
//!
//! This module contains the data structures shared by the API client and the
//! session runtime:
//!
//! - `Member`: roster entries with squad and shirt assignments
//! - `ScheduleEvent`: matches, trainings, and other calendar entries
//! - `Notice`: team announcements
//! - `UserProfile`, `TeamMembership`: the signed-in user and their roles

use serde::{Deserialize, Serialize};

// API Response wrappers

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRosterResponse {
    #[serde(rename = "teamGuid")]
    pub team_guid: Option<String>,
    #[serde(rename = "teamName")]
    pub team_name: Option<String>,
    pub members: Vec<Member>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "personGuid")]
    pub person_guid: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(rename = "squadName", default)]
    pub squad_name: Option<String>,
    #[serde(rename = "shirtNumber", default)]
    pub shirt_number: Option<i64>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEvent {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "eventType")]
    pub event_type: Option<String>,
    #[serde(rename = "opponentName", default)]
    pub opponent_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub body: Option<String>,
    #[serde(rename = "postedAt")]
    pub posted_at: Option<String>,
    #[serde(rename = "authorName")]
    pub author_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMembership {
    #[serde(rename = "teamGuid")]
    pub team_guid: String,
    #[serde(rename = "teamName")]
    pub team_name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "personGuid")]
    pub person_guid: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub email: Option<String>,
    #[serde(default)]
    pub memberships: Vec<TeamMembership>,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_roster_response() {
        let json = r#"{
            "teamGuid": "22B210E3-D325-41BE-B761-31E18BFE2C73",
            "teamName": "Riverside United U14",
            "members": [
                {"personGuid": "A", "firstName": "Sam", "lastName": "Ortiz", "position": "GK", "shirtNumber": 1},
                {"firstName": "Noa", "lastName": "Berg", "squadName": "Blue"}
            ]
        }"#;
        let roster: TeamRosterResponse = serde_json::from_str(json).expect("parse roster");
        assert_eq!(roster.members.len(), 2);
        assert_eq!(roster.members[0].full_name(), "Sam Ortiz");
        assert_eq!(roster.members[1].shirt_number, None);
    }

    #[test]
    fn parses_profile_with_memberships() {
        let json = r#"{
            "personGuid": "22B210E3-D325-41BE-B761-31E18BFE2C73",
            "firstName": "Dana",
            "lastName": "Keller",
            "email": "dana@example.com",
            "memberships": [
                {"teamGuid": "T1", "teamName": "Riverside United U14", "role": "coach"}
            ]
        }"#;
        let profile: UserProfile = serde_json::from_str(json).expect("parse profile");
        assert_eq!(profile.memberships.len(), 1);
        assert_eq!(profile.memberships[0].role.as_deref(), Some("coach"));
    }
}
