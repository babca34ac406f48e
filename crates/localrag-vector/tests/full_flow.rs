use std::fs;

use localrag_core::types::{Chunk, Score};
use localrag_core::Error;
use localrag_vector::{VectorIndex, FRAGMENTS_FILE, VECTORS_FILE};

fn chunks(n: usize) -> Vec<Chunk> {
    (0..n).map(|i| Chunk::new(format!("fragment {i}"), format!("doc{}.txt", i % 2))).collect()
}

fn seeded() -> VectorIndex {
    let mut idx = VectorIndex::new(2).expect("index");
    let vectors = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 2.0], vec![3.0, 3.0], vec![1.0, 0.0]];
    idx.add(&vectors, &chunks(5)).expect("add");
    idx
}

#[test]
fn add_assigns_sequential_ids_and_counts() {
    let idx = seeded();
    assert_eq!(idx.total(), 5);
    let ids: Vec<u64> = idx.fragments().iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    let stats = idx.stats();
    assert_eq!(stats.total_vectors, 5);
    assert_eq!(stats.dimension, 2);
    assert_eq!(stats.sources, 2);
}

#[test]
fn search_orders_by_distance_with_stable_ties() {
    let idx = seeded();
    let hits = idx.search(&[1.0, 0.0], 3).expect("search");
    let ids: Vec<u64> = hits.iter().map(|h| h.fragment.id).collect();
    // fragments 1 and 4 are both at distance 0; insertion order wins.
    assert_eq!(ids, vec![1, 4, 0]);
    assert_eq!(hits[0].score, Score::Distance(0.0));
    assert_eq!(hits[2].score, Score::Distance(1.0));
    assert!(hits.iter().all(|h| h.fused_score.is_none()));
}

#[test]
fn search_clamps_k_and_returns_everything() {
    let idx = seeded();
    let hits = idx.search(&[0.0, 0.0], 50).expect("search");
    assert_eq!(hits.len(), 5);
    let d: Vec<f32> = hits.iter().map(|h| h.score.raw()).collect();
    assert!(d.windows(2).all(|w| w[0] <= w[1]), "ascending distances: {d:?}");
}

#[test]
fn add_rejects_bad_input_without_mutating() {
    let mut idx = seeded();
    let err = idx.add(&[vec![1.0, 2.0, 3.0]], &chunks(1)).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
    let err = idx.add(&[vec![1.0, 2.0], vec![0.0, 0.0]], &chunks(1)).unwrap_err();
    assert!(matches!(err, Error::LengthMismatch { vectors: 2, items: 1 }));
    assert_eq!(idx.total(), 5);
    assert_eq!(idx.next_id(), 5);
}

#[test]
fn zero_dimension_is_rejected() {
    assert!(matches!(VectorIndex::new(0), Err(Error::InvalidConfig(_))));
    let tmp = tempfile::tempdir().expect("tmp");
    assert!(VectorIndex::load_or_new(tmp.path(), 0).is_err());
}

#[test]
fn search_on_empty_or_wrong_dimension_fails() {
    let idx = VectorIndex::new(3).expect("index");
    assert!(matches!(idx.search(&[0.0, 0.0, 0.0], 1), Err(Error::EmptyIndex)));
    let idx = seeded();
    assert!(matches!(idx.search(&[0.0], 1), Err(Error::DimensionMismatch { .. })));
}

#[test]
fn save_and_load_round_trip_is_byte_identical() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let first = tmp.path().join("a");
    let second = tmp.path().join("b");
    let idx = seeded();
    idx.save(&first)?;

    let loaded = VectorIndex::load(&first)?;
    assert_eq!(loaded.total(), 5);
    assert_eq!(loaded.fragments(), idx.fragments());
    assert_eq!(loaded.search(&[3.0, 3.0], 1)?[0].fragment.id, 3);

    loaded.save(&second)?;
    assert_eq!(fs::read(first.join(VECTORS_FILE))?, fs::read(second.join(VECTORS_FILE))?);
    assert_eq!(fs::read(first.join(FRAGMENTS_FILE))?, fs::read(second.join(FRAGMENTS_FILE))?);
    Ok(())
}

#[test]
fn load_detects_corruption() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    seeded().save(tmp.path())?;

    let path = tmp.path().join(VECTORS_FILE);
    let mut blob = fs::read(&path)?;
    blob[30] ^= 0xff;
    fs::write(&path, &blob)?;
    assert!(matches!(VectorIndex::load(tmp.path()), Err(Error::PersistenceCorruption { .. })));

    blob.truncate(10);
    fs::write(&path, &blob)?;
    assert!(matches!(VectorIndex::load(tmp.path()), Err(Error::PersistenceCorruption { .. })));
    Ok(())
}

#[test]
fn load_requires_both_files() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    assert!(matches!(VectorIndex::load(tmp.path()), Err(Error::NotFound(_))));
    assert_eq!(VectorIndex::load_or_new(tmp.path(), 2)?.total(), 0);

    seeded().save(tmp.path())?;
    fs::remove_file(tmp.path().join(FRAGMENTS_FILE))?;
    assert!(matches!(VectorIndex::load(tmp.path()), Err(Error::PersistenceCorruption { .. })));
    assert!(VectorIndex::load_or_new(tmp.path(), 2).is_err(), "half an index is never treated as empty");
    Ok(())
}

#[test]
fn fragment_count_must_match_vectors() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    seeded().save(tmp.path())?;
    let mut other = VectorIndex::new(2)?;
    other.add(&[vec![0.0, 0.0]], &chunks(1))?;
    let other_dir = tmp.path().join("other");
    other.save(&other_dir)?;
    fs::copy(other_dir.join(FRAGMENTS_FILE), tmp.path().join(FRAGMENTS_FILE))?;
    assert!(matches!(VectorIndex::load(tmp.path()), Err(Error::PersistenceCorruption { .. })));
    Ok(())
}

#[test]
fn clear_empties_and_keeps_ids_moving() -> anyhow::Result<()> {
    let mut idx = seeded();
    idx.clear();
    assert_eq!(idx.total(), 0);
    assert!(matches!(idx.search(&[0.0, 0.0], 1), Err(Error::EmptyIndex)));
    idx.add(&[vec![5.0, 5.0]], &chunks(1))?;
    assert_eq!(idx.fragments()[0].id, 5);

    let tmp = tempfile::tempdir()?;
    idx.save(tmp.path())?;
    let loaded = VectorIndex::load(tmp.path())?;
    assert_eq!(loaded.next_id(), 6);
    Ok(())
}
