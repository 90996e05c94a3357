use boardstore_core::{Board, Session, SqliteStore, Store, StoreError, User};
use serde_json::json;

fn setup() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}

fn create_user(store: &SqliteStore, username: &str) -> User {
    let user = User::new(username, format!("{username}@example.com"));
    store.create_user(&user).unwrap();
    user
}

#[test]
fn create_and_lookup_user_by_id_email_and_username() {
    let store = setup();
    let mut user = User::new("alice", "alice@example.com");
    user.password = "hash-1".to_string();
    user.props.insert("theme".to_string(), json!("dark"));
    store.create_user(&user).unwrap();

    let by_id = store.get_user_by_id(&user.id).unwrap();
    assert_eq!(by_id.username, "alice");
    assert_eq!(by_id.password, "hash-1");
    assert_eq!(by_id.props, user.props);

    assert_eq!(store.get_user_by_email("ALICE@example.com").unwrap().id, user.id);
    assert_eq!(store.get_user_by_username("Alice").unwrap().id, user.id);
    assert_eq!(store.get_registered_user_count().unwrap(), 1);
}

#[test]
fn missing_user_lookups_are_not_found() {
    let store = setup();
    assert!(store.get_user_by_id("u-missing").unwrap_err().is_not_found());
    assert!(store
        .get_user_by_email("nobody@example.com")
        .unwrap_err()
        .is_not_found());
    assert!(store
        .get_user_by_username("nobody")
        .unwrap_err()
        .is_not_found());
}

#[test]
fn duplicate_username_is_a_backend_error() {
    let store = setup();
    create_user(&store, "bob");
    let clash = User::new("BOB", "other@example.com");
    let err = store.create_user(&clash).unwrap_err();
    assert!(matches!(err, StoreError::Db(_)));
    assert!(!store.is_err_not_found(&err));
}

#[test]
fn update_user_and_passwords() {
    let store = setup();
    let mut user = create_user(&store, "carol");

    user.email = "carol@new.example.com".to_string();
    store.update_user(&user).unwrap();
    assert_eq!(
        store.get_user_by_id(&user.id).unwrap().email,
        "carol@new.example.com"
    );

    store.update_user_password("carol", "hash-a").unwrap();
    assert_eq!(store.get_user_by_id(&user.id).unwrap().password, "hash-a");
    store.update_user_password_by_id(&user.id, "hash-b").unwrap();
    assert_eq!(store.get_user_by_id(&user.id).unwrap().password, "hash-b");

    let ghost = User::new("ghost", "ghost@example.com");
    assert!(store.update_user(&ghost).unwrap_err().is_not_found());
    assert!(store
        .update_user_password("ghost", "x")
        .unwrap_err()
        .is_not_found());
    assert!(store
        .update_user_password_by_id("u-ghost", "x")
        .unwrap_err()
        .is_not_found());
}

#[test]
fn users_by_team_follow_board_membership() {
    let store = setup();
    let dave = create_user(&store, "dave");
    let erin = create_user(&store, "erin");
    create_user(&store, "frank");

    store
        .insert_board_with_admin(&Board::new("team-1", "One"), &dave.id)
        .unwrap();
    store
        .insert_board_with_admin(&Board::new("team-1", "Two"), &erin.id)
        .unwrap();
    store
        .insert_board_with_admin(&Board::new("team-2", "Three"), &erin.id)
        .unwrap();

    let members = store.get_users_by_team("team-1").unwrap();
    let names: Vec<&str> = members.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["dave", "erin"]);
    assert!(store.get_users_by_team("team-9").unwrap().is_empty());
}

#[test]
fn session_lifecycle() {
    let store = setup();
    let user = create_user(&store, "gina");
    let mut session = Session::new(user.id.clone());
    store.create_session(&session).unwrap();

    let fetched = store.get_session(&session.token, 60).unwrap();
    assert_eq!(fetched.id, session.id);
    assert_eq!(fetched.user_id, user.id);
    assert_eq!(store.get_active_user_count(60).unwrap(), 1);

    session.props.insert("device".to_string(), json!("laptop"));
    store.update_session(&session).unwrap();
    store.refresh_session(&session).unwrap();
    assert_eq!(
        store.get_session(&session.token, 60).unwrap().props,
        session.props
    );

    store.delete_session(&session.id).unwrap();
    store.delete_session(&session.id).unwrap();
    assert!(store
        .get_session(&session.token, 60)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn expired_sessions_are_hidden_and_cleaned_up() {
    let store = setup();
    let stale = Session::new("u-1");
    store.create_session(&stale).unwrap();

    assert!(store
        .get_session(&stale.token, -60)
        .unwrap_err()
        .is_not_found());

    store.clean_up_sessions(3600).unwrap();
    assert!(store.get_session(&stale.token, 3600).is_ok());

    store.clean_up_sessions(-60).unwrap();
    assert!(store
        .get_session(&stale.token, 3600)
        .unwrap_err()
        .is_not_found());
}

#[test]
fn refreshing_unknown_session_is_not_found() {
    let store = setup();
    let session = Session::new("u-1");
    assert!(store.refresh_session(&session).unwrap_err().is_not_found());
    assert!(store.update_session(&session).unwrap_err().is_not_found());
}
