use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

use voyager_core::parse::invitations::parse_invitations_from_flagship_rsc_at;

const PAGE: &str = include_str!("../fixtures/invitations_page.rsc");

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 9, 30, 0).unwrap()
}

#[test]
fn streamed_invitation_page_yields_both_invitations_in_order() {
    let invs = parse_invitations_from_flagship_rsc_at(PAGE, "https://www.linkedin.com", fixed_now());

    assert_eq!(invs.len(), 2);

    assert_eq!(invs[0].inviter.username, "newconnection");
    assert_eq!(invs[0].inviter.first_name, "New");
    assert_eq!(invs[0].inviter.last_name, "Connection");
    assert_eq!(invs[0].inviter.headline, "Platform Engineer at Orbit");
    assert_eq!(
        invs[0].inviter.profile_url,
        "https://www.linkedin.com/in/newconnection"
    );
    assert_eq!(invs[0].message, "would love to connect");
    assert_eq!(invs[0].urn, "urn:li:fsd_invitation:1001");
    assert_eq!(
        invs[0].sent_at,
        (fixed_now() - Duration::days(2)).timestamp_millis()
    );

    assert_eq!(invs[1].inviter.username, "anotherone");
    assert_eq!(invs[1].inviter.first_name, "Another");
    assert_eq!(invs[1].inviter.last_name, "One");
    assert_eq!(invs[1].message, "");
    assert_eq!(
        invs[1].sent_at,
        (fixed_now() - Duration::weeks(1)).timestamp_millis()
    );
}

#[test]
fn reparsing_the_same_page_is_stable() {
    let first = parse_invitations_from_flagship_rsc_at(PAGE, "https://www.linkedin.com", fixed_now());
    let second = parse_invitations_from_flagship_rsc_at(PAGE, "https://www.linkedin.com", fixed_now());
    assert_eq!(first, second);
}
