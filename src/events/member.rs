// Copyright (c) 2025 - Cowboy AI, Inc.
//! Member Domain Events
//!
//! State changes of the Member aggregate and of the social graph between
//! members. Every event here is keyed by the acting member's id, so all events
//! of one member land on the same partition in publish order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{require_non_empty, DomainEvent, EventHeader};

const MEMBER: &str = "Member";

/// A new member signed up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRegistered {
    #[serde(flatten)]
    pub header: EventHeader,
    pub member_id: String,
    pub email: String,
    pub name: String,
}

impl MemberRegistered {
    pub fn create(
        member_id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let member_id = member_id.into();
        Self {
            header: EventHeader::new(MEMBER, member_id.clone()),
            member_id,
            email: email.into(),
            name: name.into(),
        }
    }
}

impl DomainEvent for MemberRegistered {
    const EVENT_TYPE: &'static str = "member.registered";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        require_non_empty("memberId", &self.member_id)?;
        if !self.email.contains('@') {
            return Err(format!("'{}' is not an email address", self.email));
        }
        Ok(())
    }
}

/// Member account was activated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberActivated {
    #[serde(flatten)]
    pub header: EventHeader,
    pub member_id: String,
    /// RFC 3339 timestamp
    pub activated_at: String,
}

impl MemberActivated {
    pub fn create(member_id: impl Into<String>) -> Self {
        let member_id = member_id.into();
        let header = EventHeader::new(MEMBER, member_id.clone());
        let activated_at = header.occurred_at.to_rfc3339();
        Self {
            header,
            member_id,
            activated_at,
        }
    }
}

impl DomainEvent for MemberActivated {
    const EVENT_TYPE: &'static str = "member.activated";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        require_non_empty("memberId", &self.member_id)
    }
}

/// Member account was deactivated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDeactivated {
    #[serde(flatten)]
    pub header: EventHeader,
    pub member_id: String,
    /// RFC 3339 timestamp
    pub deactivated_at: String,
}

impl MemberDeactivated {
    pub fn create(member_id: impl Into<String>) -> Self {
        let member_id = member_id.into();
        let header = EventHeader::new(MEMBER, member_id.clone());
        let deactivated_at = header.occurred_at.to_rfc3339();
        Self {
            header,
            member_id,
            deactivated_at,
        }
    }
}

impl DomainEvent for MemberDeactivated {
    const EVENT_TYPE: &'static str = "member.deactivated";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        require_non_empty("memberId", &self.member_id)
    }
}

/// Profile section changed; both snapshots are carried
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfileUpdated {
    #[serde(flatten)]
    pub header: EventHeader,
    pub member_id: String,
    pub old_profile: Map<String, Value>,
    pub new_profile: Map<String, Value>,
}

impl MemberProfileUpdated {
    pub fn create(
        member_id: impl Into<String>,
        old_profile: Map<String, Value>,
        new_profile: Map<String, Value>,
    ) -> Self {
        let member_id = member_id.into();
        Self {
            header: EventHeader::new(MEMBER, member_id.clone()),
            member_id,
            old_profile,
            new_profile,
        }
    }
}

impl DomainEvent for MemberProfileUpdated {
    const EVENT_TYPE: &'static str = "member.profile.updated";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }
}

/// Identity section changed; both snapshots are carried
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberIdentityUpdated {
    #[serde(flatten)]
    pub header: EventHeader,
    pub member_id: String,
    pub old_identity: Map<String, Value>,
    pub new_identity: Map<String, Value>,
}

impl MemberIdentityUpdated {
    pub fn create(
        member_id: impl Into<String>,
        old_identity: Map<String, Value>,
        new_identity: Map<String, Value>,
    ) -> Self {
        let member_id = member_id.into();
        Self {
            header: EventHeader::new(MEMBER, member_id.clone()),
            member_id,
            old_identity,
            new_identity,
        }
    }
}

impl DomainEvent for MemberIdentityUpdated {
    const EVENT_TYPE: &'static str = "member.identity.updated";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }
}

/// Social graph events are keyed by the acting member
fn social_header(member_id: &str) -> EventHeader {
    EventHeader::new(MEMBER, member_id)
}

fn check_pair(member_id: &str, other_field: &str, other_id: &str) -> Result<(), String> {
    require_non_empty("memberId", member_id)?;
    require_non_empty(other_field, other_id)?;
    if member_id == other_id {
        return Err(format!("'{}' must differ from 'memberId'", other_field));
    }
    Ok(())
}

/// Member added another member as a friend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberFriendAdded {
    #[serde(flatten)]
    pub header: EventHeader,
    pub member_id: String,
    pub friend_member_id: String,
}

impl MemberFriendAdded {
    pub fn create(member_id: impl Into<String>, friend_member_id: impl Into<String>) -> Self {
        let member_id = member_id.into();
        Self {
            header: social_header(&member_id),
            member_id,
            friend_member_id: friend_member_id.into(),
        }
    }
}

impl DomainEvent for MemberFriendAdded {
    const EVENT_TYPE: &'static str = "member.friend.added";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        check_pair(&self.member_id, "friendMemberId", &self.friend_member_id)
    }
}

/// Member removed a friend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberFriendRemoved {
    #[serde(flatten)]
    pub header: EventHeader,
    pub member_id: String,
    pub friend_member_id: String,
}

impl MemberFriendRemoved {
    pub fn create(member_id: impl Into<String>, friend_member_id: impl Into<String>) -> Self {
        let member_id = member_id.into();
        Self {
            header: social_header(&member_id),
            member_id,
            friend_member_id: friend_member_id.into(),
        }
    }
}

impl DomainEvent for MemberFriendRemoved {
    const EVENT_TYPE: &'static str = "member.friend.removed";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        check_pair(&self.member_id, "friendMemberId", &self.friend_member_id)
    }
}

/// Member started following another member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberFollowed {
    #[serde(flatten)]
    pub header: EventHeader,
    pub member_id: String,
    pub followed_member_id: String,
}

impl MemberFollowed {
    pub fn create(member_id: impl Into<String>, followed_member_id: impl Into<String>) -> Self {
        let member_id = member_id.into();
        Self {
            header: social_header(&member_id),
            member_id,
            followed_member_id: followed_member_id.into(),
        }
    }
}

impl DomainEvent for MemberFollowed {
    const EVENT_TYPE: &'static str = "member.followed";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        check_pair(&self.member_id, "followedMemberId", &self.followed_member_id)
    }
}

/// Member stopped following another member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberUnfollowed {
    #[serde(flatten)]
    pub header: EventHeader,
    pub member_id: String,
    pub unfollowed_member_id: String,
}

impl MemberUnfollowed {
    pub fn create(member_id: impl Into<String>, unfollowed_member_id: impl Into<String>) -> Self {
        let member_id = member_id.into();
        Self {
            header: social_header(&member_id),
            member_id,
            unfollowed_member_id: unfollowed_member_id.into(),
        }
    }
}

impl DomainEvent for MemberUnfollowed {
    const EVENT_TYPE: &'static str = "member.unfollowed";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        check_pair(
            &self.member_id,
            "unfollowedMemberId",
            &self.unfollowed_member_id,
        )
    }
}

/// Member opened a realtime connection
///
/// Belongs to the "Connection" aggregate rather than "Member".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberConnected {
    #[serde(flatten)]
    pub header: EventHeader,
    pub member_id: String,
    /// RFC 3339 timestamp
    pub connected_at: String,
}

impl MemberConnected {
    pub fn create(member_id: impl Into<String>) -> Self {
        let member_id = member_id.into();
        let header = EventHeader::new("Connection", member_id.clone());
        let connected_at = header.occurred_at.to_rfc3339();
        Self {
            header,
            member_id,
            connected_at,
        }
    }
}

impl DomainEvent for MemberConnected {
    const EVENT_TYPE: &'static str = "event.member.connected";
    const VERSION: u32 = 1;

    fn header(&self) -> &EventHeader {
        &self.header
    }

    fn check(&self) -> Result<(), String> {
        require_non_empty("memberId", &self.member_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_registered_payload() {
        let event = MemberRegistered::create("m-1", "ana@example.com", "Ana Souza");
        let payload = serde_json::to_value(&event).unwrap();

        assert_eq!(payload["memberId"], "m-1");
        assert_eq!(payload["aggregateId"], "m-1");
        assert_eq!(payload["aggregateType"], "Member");
        assert_eq!(payload["name"], "Ana Souza");
        assert!(payload.get("occurredAt").is_some());
    }

    #[test]
    fn test_member_registered_rejects_bad_email() {
        let event = MemberRegistered::create("m-1", "not-an-email", "Ana");
        assert!(event.check().is_err());
    }

    #[test]
    fn test_cannot_follow_self() {
        let event = MemberFollowed::create("m-1", "m-1");
        assert_eq!(
            event.check().unwrap_err(),
            "'followedMemberId' must differ from 'memberId'"
        );
        assert!(MemberFollowed::create("m-1", "m-2").check().is_ok());
    }

    #[test]
    fn test_profile_update_deserializes_from_wire_payload() {
        let event: MemberProfileUpdated = serde_json::from_value(json!({
            "id": "01890a5d-ac96-774b-bcce-b302099a8057",
            "aggregateType": "Member",
            "aggregateId": "m-9",
            "occurredAt": "2026-01-19T12:00:00Z",
            "memberId": "m-9",
            "oldProfile": {"bio": "old"},
            "newProfile": {"bio": "new"}
        }))
        .unwrap();

        assert_eq!(event.header.aggregate_id, "m-9");
        assert_eq!(event.new_profile["bio"], "new");
    }

    #[test]
    fn test_member_connected_uses_connection_aggregate() {
        let event = MemberConnected::create("m-3");
        assert_eq!(event.header.aggregate_type, "Connection");
        assert_eq!(MemberConnected::EVENT_TYPE, "event.member.connected");
    }
}
