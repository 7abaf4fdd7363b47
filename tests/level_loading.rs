//! Integration tests for reading level files from disk.

use sokolink::{Cell, Level, LevelCollection, Point, PuzzleState, SokolinkError, SokolinkResult};
use std::io::Write;
use tempfile::NamedTempFile;

const COLLECTION: &str = "\
Level 1
'Warm Up'
#####
#@$.#
#####

Level 2
'No Player'
######
# $ .#
######

Level 3
  ####
###  #
#@ $.#
######
";

fn write_temp(text: &str) -> SokolinkResult<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn test_collection_file_loads_playable_levels() -> SokolinkResult<()> {
    let file = write_temp(COLLECTION)?;
    let collection = LevelCollection::load_from_path(file.path())?;

    assert_eq!(collection.len(), 3);
    let ids: Vec<u32> = collection.playable().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![1, 3]);

    let first = collection.get(1)?;
    assert_eq!(first.name.as_deref(), Some("Warm Up"));
    assert_eq!(first.player, Point::new(1, 1));

    let third = collection.get(3)?;
    assert_eq!(third.name.as_deref(), Some("Level 3"));
    assert_eq!(third.cell(Point::new(0, 0)), Some(Cell::Void));
    assert_eq!(third.cell(Point::new(3, 1)), Some(Cell::Floor));
    Ok(())
}

#[test]
fn test_level_without_player_is_blocked() -> SokolinkResult<()> {
    let file = write_temp(COLLECTION)?;
    let collection = LevelCollection::load_from_path(file.path())?;

    let blocked = collection
        .entries
        .iter()
        .find(|entry| entry.id == 2)
        .expect("entry 2 should be listed");
    assert_eq!(blocked.title.as_deref(), Some("No Player"));
    assert!(matches!(blocked.level, Err(SokolinkError::StructuralLevel(_))));
    assert!(matches!(collection.get(2), Err(SokolinkError::StructuralLevel(_))));
    Ok(())
}

#[test]
fn test_single_grid_file_with_crlf() -> SokolinkResult<()> {
    let file = write_temp("\r\n######\r\n#@ $.#\r\n######\r\n\r\n")?;
    let collection = LevelCollection::load_from_path(file.path())?;

    let (id, level) = collection
        .playable()
        .next()
        .expect("the grid should load as level 1");
    assert_eq!(id, 1);
    assert_eq!(level.width, 6);
    assert_eq!(level.height, 3);
    assert_eq!(level.boxes, vec![Point::new(3, 1)]);
    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let result = LevelCollection::load_from_path("/definitely/not/a/level/file.txt");
    assert!(matches!(result, Err(SokolinkError::Io(_))));
}

#[test]
fn test_unsolvable_layout_still_loads() -> SokolinkResult<()> {
    // Box in a corner can never move, but the level is structurally fine.
    let level = Level::parse("#####\n#$  #\n# @.#\n#####")?;
    let mut puzzle = PuzzleState::new(level);
    assert!(!puzzle.is_won());
    assert!(puzzle.attempt_move(sokolink::Direction::Left).is_success());
    Ok(())
}
