use boardstore_core::{Board, Sharing, SqliteStore, Store, Team};
use serde_json::json;

fn setup() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}

#[test]
fn system_settings_upsert_and_list() {
    let store = setup();
    assert!(store
        .get_system_setting("telemetry")
        .unwrap_err()
        .is_not_found());

    store.set_system_setting("telemetry", "on").unwrap();
    store.set_system_setting("telemetry", "off").unwrap();
    store.set_system_setting("version", "7").unwrap();

    assert_eq!(store.get_system_setting("telemetry").unwrap(), "off");
    let all = store.get_system_settings().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all.get("version").map(String::as_str), Some("7"));
}

#[test]
fn team_upserts_touch_only_their_column() {
    let store = setup();
    let mut team = Team::new("team-1", "Platform");
    team.signup_token = "token-1".to_string();
    store.upsert_team_signup_token(&team).unwrap();

    team.settings.insert("locale".to_string(), json!("de"));
    team.signup_token = "ignored".to_string();
    store.upsert_team_settings(&team).unwrap();

    let stored = store.get_team("team-1").unwrap();
    assert_eq!(stored.title, "Platform");
    assert_eq!(stored.signup_token, "token-1");
    assert_eq!(stored.settings.get("locale"), Some(&json!("de")));

    assert!(store.get_team("team-9").unwrap_err().is_not_found());
}

#[test]
fn team_listing_and_count() {
    let store = setup();
    store
        .upsert_team_signup_token(&Team::new("team-b", "B"))
        .unwrap();
    store
        .upsert_team_signup_token(&Team::new("team-a", "A"))
        .unwrap();

    let ids: Vec<String> = store
        .get_all_teams()
        .unwrap()
        .into_iter()
        .map(|team| team.id)
        .collect();
    assert_eq!(ids, vec!["team-a".to_string(), "team-b".to_string()]);
    assert_eq!(store.get_team_count().unwrap(), 2);
}

#[test]
fn teams_for_user_follow_board_membership() {
    let store = setup();
    for id in ["team-1", "team-2", "team-3"] {
        store.upsert_team_signup_token(&Team::new(id, id)).unwrap();
    }
    store
        .insert_board_with_admin(&Board::new("team-1", "One"), "user-1")
        .unwrap();
    store
        .insert_board_with_admin(&Board::new("team-2", "Two"), "user-1")
        .unwrap();
    store
        .insert_board_with_admin(&Board::new("team-3", "Three"), "user-2")
        .unwrap();

    let ids: Vec<String> = store
        .get_teams_for_user("user-1")
        .unwrap()
        .into_iter()
        .map(|team| team.id)
        .collect();
    assert_eq!(ids, vec!["team-1".to_string(), "team-2".to_string()]);
    assert!(store.get_teams_for_user("user-9").unwrap().is_empty());
}

#[test]
fn sharing_upsert_and_get() {
    let store = setup();
    assert!(store.get_sharing("root-1").unwrap_err().is_not_found());

    let mut sharing = Sharing {
        id: "root-1".to_string(),
        enabled: true,
        token: "share-token".to_string(),
        modified_by: "user-1".to_string(),
        update_at: 0,
    };
    store.upsert_sharing(&sharing).unwrap();
    sharing.enabled = false;
    store.upsert_sharing(&sharing).unwrap();

    let stored = store.get_sharing("root-1").unwrap();
    assert!(!stored.enabled);
    assert_eq!(stored.token, "share-token");
    assert!(stored.update_at > 0);
}
