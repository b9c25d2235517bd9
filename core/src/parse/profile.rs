//! Profile extraction.

use serde_json::Value;

use crate::models::Profile;
use crate::parse::localized::localized_field;
use crate::parse::shapes::{first_match, included, str_field, urn_id};

/// Extract a single profile from any of the known response shapes, in
/// priority order: directly embedded entity, `data` + `included`
/// normalization, GraphQL-dash envelope. `None` only when no shape
/// produced a usable entity.
pub fn parse_profile(root: &Value, web_base: &str) -> Option<Profile> {
    let matchers: &[fn(&Value) -> Option<Profile>] = &[
        match_direct,
        match_included,
        match_graphql_dash,
    ];
    first_match(root, matchers).map(|p| p.with_profile_url(web_base))
}

/// Build a profile from an object that itself carries the identity fields.
/// Shared by every shape matcher once it has located the entity.
pub(crate) fn profile_from_entity(entity: &Value) -> Option<Profile> {
    let username = str_field(entity, "publicIdentifier");
    let first_name = localized_field(entity, "firstName");
    let last_name = localized_field(entity, "lastName");
    if username.is_empty() && first_name.is_empty() && last_name.is_empty() {
        return None;
    }
    Some(Profile {
        urn: str_field(entity, "entityUrn"),
        username,
        first_name,
        last_name,
        headline: localized_field(entity, "headline"),
        location: pick_location(entity),
        profile_url: String::new(),
    })
}

fn pick_location(entity: &Value) -> String {
    for field in ["locationName", "geoLocationName"] {
        let loc = localized_field(entity, field);
        if !loc.is_empty() {
            return loc;
        }
    }
    String::new()
}

/// Legacy `/identity/profiles/<id>/profileView` style: entity at the root,
/// or under a `profile` key.
fn match_direct(root: &Value) -> Option<Profile> {
    if let Some(profile) = profile_from_entity(root) {
        return Some(profile);
    }
    root.get("profile").and_then(profile_from_entity)
}

/// `data` + `included`: find the profile entity in the flat array. When
/// `data` names a `*profile` reference, resolve it; otherwise take the
/// first included entry that looks like a profile.
fn match_included(root: &Value) -> Option<Profile> {
    let wanted_urn = root
        .get("data")
        .and_then(Value::as_object)
        .and_then(|data| {
            data.iter().find_map(|(key, value)| {
                if key.to_ascii_lowercase().contains("profile") {
                    value.as_str()
                } else {
                    None
                }
            })
        });

    let entries = included(root);
    if let Some(urn) = wanted_urn {
        if let Some(entity) = entries
            .iter()
            .find(|e| e.get("entityUrn").and_then(Value::as_str) == Some(urn))
        {
            if let Some(profile) = profile_from_entity(entity) {
                return Some(profile);
            }
        }
    }
    entries.iter().find_map(profile_from_entity)
}

/// GraphQL: `data.identityDashProfilesByMemberIdentity.elements[0]`, with
/// the bare `elements[0]` form as a variant.
fn match_graphql_dash(root: &Value) -> Option<Profile> {
    let data = root.get("data").unwrap_or(root);
    let elements = data
        .get("identityDashProfilesByMemberIdentity")
        .and_then(|v| v.get("elements"))
        .or_else(|| data.get("elements"))
        .and_then(Value::as_array)?;
    elements.iter().find_map(|element| {
        profile_from_entity(element).map(|mut profile| {
            if profile.urn.is_empty() {
                let urn = str_field(element, "*profile");
                profile.urn = urn_id(&urn).to_string();
            }
            profile
        })
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use serde_json::json;

    #[test]
    fn direct_shape_with_localized_names() {
        let root = json!({
            "entityUrn": "urn:li:fs_profile:AB12",
            "publicIdentifier": "jane-doe",
            "firstName": {"localized": {"en_US": "Jane"}},
            "lastName": {"localized": {"en_US": "Doe"}},
            "headline": {"localized": {"en_US": "Engineer"}},
            "locationName": "Lisbon"
        });
        let p = parse_profile(&root, "https://www.linkedin.com").unwrap();
        assert_eq!(p.username, "jane-doe");
        assert_eq!(p.first_name, "Jane");
        assert_eq!(p.headline, "Engineer");
        assert_eq!(p.location, "Lisbon");
        assert_eq!(p.profile_url, "https://www.linkedin.com/in/jane-doe");
    }

    #[test]
    fn included_shape_resolves_reference() {
        let root = json!({
            "data": {"*profile": "urn:li:fs_profile:2"},
            "included": [
                {"entityUrn": "urn:li:fs_profile:1", "publicIdentifier": "other",
                 "firstName": "Other", "lastName": "One"},
                {"entityUrn": "urn:li:fs_profile:2", "publicIdentifier": "target",
                 "firstName": "Tar", "lastName": "Get"}
            ]
        });
        let p = parse_profile(&root, "https://b").unwrap();
        assert_eq!(p.username, "target");
    }

    #[test]
    fn graphql_dash_shape() {
        let root = json!({
            "data": {
                "identityDashProfilesByMemberIdentity": {
                    "elements": [{
                        "publicIdentifier": "gq-user",
                        "firstName": "G", "lastName": "Q",
                        "headline": "Head"
                    }]
                }
            }
        });
        let p = parse_profile(&root, "https://b").unwrap();
        assert_eq!(p.username, "gq-user");
        assert_eq!(p.headline, "Head");
    }

    #[test]
    fn unrecognized_payload_yields_none() {
        assert!(parse_profile(&json!({"foo": "bar"}), "https://b").is_none());
    }

    #[test]
    fn bare_string_names_are_accepted() {
        let root = json!({"publicIdentifier": "x", "firstName": "A", "lastName": "B"});
        let p = parse_profile(&root, "https://b").unwrap();
        assert_eq!(p.display_name(), "A B");
    }
}
