use boardstore_core::{
    is_err_not_found, Block, BlockType, Board, SqliteStore, Store, StoreError, Team, User,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
struct HandlerError {
    source: StoreError,
}

impl Display for HandlerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "request failed: {}", self.source)
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

#[test]
fn team_user_board_card_lifecycle() {
    let store = SqliteStore::open_in_memory().unwrap();

    let team = Team::new("team-t", "Team T");
    store.upsert_team_signup_token(&team).unwrap();
    let user = User::new("u", "u@example.com");
    store.create_user(&user).unwrap();

    let (board, _) = store
        .insert_board_with_admin(&Board::new(team.id.clone(), "Board B"), &user.id)
        .unwrap();
    assert_eq!(board.created_by, user.id);

    let mut card = Block::new(board.id.clone(), BlockType::Card);
    card.root_id = card.id.clone();
    store.insert_block(&card, &user.id).unwrap();

    let (found_board, found_card) = store.get_board_and_card(&card).unwrap();
    assert_eq!(found_board.id, board.id);
    assert_eq!(found_card.id, card.id);

    assert_eq!(store.get_users_by_team(&team.id).unwrap()[0].id, user.id);
    assert_eq!(store.get_teams_for_user(&user.id).unwrap()[0].id, team.id);

    store.delete_board(&board.id, &user.id).unwrap();
    let err = store.get_board(&board.id).unwrap_err();
    assert!(err.is_not_found());
    assert!(store.get_block(&card.id).unwrap_err().is_not_found());
}

#[test]
fn not_found_is_classified_through_wrapping_errors() {
    let store = SqliteStore::open_in_memory().unwrap();
    let wrapped = HandlerError {
        source: store.get_team("missing").unwrap_err(),
    };
    assert!(is_err_not_found(&wrapped));
    assert!(store.is_err_not_found(&wrapped));

    let boxed: Box<dyn Error> = Box::new(HandlerError {
        source: StoreError::Closed,
    });
    assert!(!is_err_not_found(boxed.as_ref()));
}

#[test]
fn store_is_unusable_after_shutdown() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set_system_setting("k", "v").unwrap();

    store.shutdown().unwrap();

    assert!(matches!(
        store.get_system_setting("k"),
        Err(StoreError::Closed)
    ));
    assert!(matches!(
        store.insert_board(&Board::new("team-1", "late"), "user-1"),
        Err(StoreError::Closed)
    ));
    assert!(matches!(store.shutdown(), Err(StoreError::Closed)));
}
