use index_core::codec::{put_f32, put_term_key, put_varint};
use index_core::store::{encode_store, StoreKind};
use index_core::{
    AcceptAll, Database, DatabaseParams, DocMeta, ExpansionEngine, IndexBuilder, IndexError,
    IndexPaths, PostingList, RSet, RelevanceCount, TermList,
};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn meta(id: &str) -> Vec<u8> {
    DocMeta { external_id: id.into(), title: format!("Doc {id}"), url: None }
        .to_record()
        .unwrap()
}

fn tiny_builder() -> IndexBuilder {
    let mut b = IndexBuilder::new();
    b.add_document(1, meta("one"), [("cat", 2), ("dog", 1)]).unwrap();
    b.add_document(2, meta("two"), [("cat", 1), ("bird", 3)]).unwrap();
    b.add_document(5, meta("five"), [("fish", 1), ("cat", 1)]).unwrap();
    b
}

fn build_tiny_index(dir: &Path) -> Database {
    tiny_builder().write(&IndexPaths::new(dir)).unwrap();
    Database::open(&DatabaseParams::new(dir)).unwrap()
}

fn drain(pl: &mut dyn PostingList) -> Vec<(u32, f32)> {
    let mut out = Vec::new();
    pl.next(0.0).unwrap();
    while !pl.at_end().unwrap() {
        out.push((pl.current_doc_id().unwrap(), pl.current_weight().unwrap()));
        pl.next(0.0).unwrap();
    }
    out
}

#[test]
fn open_fails_for_missing_or_partial_index() {
    let dir = tempdir().unwrap();
    let err = Database::open(&DatabaseParams::new(dir.path().join("nope"))).err().unwrap();
    assert!(matches!(err, IndexError::DatabaseOpen(_)));

    let paths = IndexPaths::new(dir.path());
    tiny_builder().write(&paths).unwrap();
    fs::remove_file(paths.termvecs()).unwrap();
    let err = Database::open(&DatabaseParams::new(dir.path())).err().unwrap();
    assert!(matches!(err, IndexError::DatabaseOpen(_)));
}

#[test]
fn open_fails_on_bad_magic_or_version() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let (postings, termvecs) = tiny_builder().to_bytes().unwrap();

    let mut bad_magic = postings.clone();
    bad_magic[0] = b'X';
    fs::write(paths.postings(), &bad_magic).unwrap();
    fs::write(paths.termvecs(), &termvecs).unwrap();
    assert!(matches!(Database::open(&DatabaseParams::new(dir.path())), Err(IndexError::DatabaseOpen(_))));

    let mut bad_version = postings.clone();
    bad_version[4] = 2;
    fs::write(paths.postings(), &bad_version).unwrap();
    assert!(matches!(Database::open(&DatabaseParams::new(dir.path())), Err(IndexError::DatabaseOpen(_))));

    // stores swapped: kind mismatch
    fs::write(paths.postings(), &termvecs).unwrap();
    fs::write(paths.termvecs(), &postings).unwrap();
    assert!(matches!(Database::open(&DatabaseParams::new(dir.path())), Err(IndexError::DatabaseOpen(_))));
}

#[test]
fn open_fails_when_stores_disagree() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let (postings, _) = tiny_builder().to_bytes().unwrap();
    let mut other = IndexBuilder::new();
    other.add_document(1, vec![], [("cat", 1)]).unwrap();
    let (_, termvecs) = other.to_bytes().unwrap();
    fs::write(paths.postings(), postings).unwrap();
    fs::write(paths.termvecs(), termvecs).unwrap();
    assert!(matches!(Database::open(&DatabaseParams::new(dir.path())), Err(IndexError::DatabaseOpen(_))));
}

#[test]
fn header_statistics() {
    let dir = tempdir().unwrap();
    let db = build_tiny_index(dir.path());
    assert_eq!(db.doc_count(), 3);
    assert!((db.avg_doc_length() - 3.0).abs() < 1e-9);
    assert_eq!(db.doc_length(2).unwrap(), 4);
    assert_eq!(db.doc_ids().collect::<Result<Vec<_>, _>>().unwrap(), vec![1, 2, 5]);
}

#[test]
fn empty_index_opens() {
    let dir = tempdir().unwrap();
    IndexBuilder::new().write(&IndexPaths::new(dir.path())).unwrap();
    let db = Database::open(&DatabaseParams::new(dir.path())).unwrap();
    assert_eq!(db.doc_count(), 0);
    assert_eq!(db.avg_doc_length(), 0.0);
    assert!(!db.term_exists(b"cat"));
}

#[test]
fn term_exists_never_throws_and_is_stable() {
    let dir = tempdir().unwrap();
    let db = build_tiny_index(dir.path());
    for _ in 0..2 {
        assert!(db.term_exists(b"cat"));
        assert!(!db.term_exists(b"nonexistent"));
        assert!(!db.term_exists(b""));
        assert!(!db.term_exists(&[b'z'; 300]));
    }
}

#[test]
fn missing_term_is_term_not_found() {
    let dir = tempdir().unwrap();
    let db = build_tiny_index(dir.path());
    let err = db.open_posting_list(b"nonexistent").err().unwrap();
    assert!(matches!(err, IndexError::TermNotFound(_)));
    assert!(err.is_not_found());
    assert_eq!(db.term_frequency(b"nonexistent").unwrap(), 0);
}

#[test]
fn posting_list_walk() {
    let dir = tempdir().unwrap();
    let db = build_tiny_index(dir.path());
    let mut pl = db.open_posting_list(b"cat").unwrap();
    assert_eq!(pl.termfreq(), 3);
    assert_eq!(pl.description(), "cat:3");
    assert_eq!(drain(pl.as_mut()), vec![(1, 2.0), (2, 1.0), (5, 1.0)]);
    assert!(matches!(pl.next(0.0), Err(IndexError::IllegalState(_))));
    assert_eq!(db.term_frequency(b"bird").unwrap(), 1);
}

#[test]
fn unstarted_posting_list_is_illegal_to_read() {
    let dir = tempdir().unwrap();
    let db = build_tiny_index(dir.path());
    let pl = db.open_posting_list(b"dog").unwrap();
    assert_eq!(pl.termfreq(), 1);
    assert!(matches!(pl.current_doc_id(), Err(IndexError::IllegalState(_))));
    assert!(matches!(pl.at_end(), Err(IndexError::IllegalState(_))));
}

#[test]
fn posting_list_skip_to() {
    let dir = tempdir().unwrap();
    let db = build_tiny_index(dir.path());
    let mut pl = db.open_posting_list(b"cat").unwrap();
    pl.skip_to(3, 0.0).unwrap();
    assert_eq!(pl.current_doc_id().unwrap(), 5);
    pl.skip_to(6, 0.0).unwrap();
    assert!(pl.at_end().unwrap());

    let mut pl = db.open_posting_list(b"cat").unwrap();
    pl.skip_to(2, 0.0).unwrap();
    assert_eq!(pl.current_doc_id().unwrap(), 2);
    pl.next(1.5).unwrap();
    assert!(pl.at_end().unwrap(), "weight 1.0 at doc 5 is below the threshold");
}

#[test]
fn term_list_walk() {
    let dir = tempdir().unwrap();
    let db = build_tiny_index(dir.path());
    let mut tl = db.open_term_list(1).unwrap();
    assert_eq!(tl.approx_size(), 2);
    assert!(matches!(tl.current_term(), Err(IndexError::IllegalState(_))));
    assert!(matches!(tl.at_end(), Err(IndexError::IllegalState(_))));

    let mut seen = Vec::new();
    tl.next().unwrap();
    while !tl.at_end().unwrap() {
        seen.push((
            String::from_utf8(tl.current_term().unwrap().to_vec()).unwrap(),
            tl.current_wdf().unwrap(),
            tl.current_termfreq().unwrap(),
        ));
        tl.next().unwrap();
    }
    assert_eq!(seen, vec![("cat".to_string(), 2, 3), ("dog".to_string(), 1, 1)]);
    assert!(matches!(tl.current_wdf(), Err(IndexError::IllegalState(_))));
    assert!(matches!(tl.next(), Err(IndexError::IllegalState(_))));
}

#[test]
fn missing_document_is_doc_not_found() {
    let dir = tempdir().unwrap();
    let db = build_tiny_index(dir.path());
    assert!(matches!(db.open_term_list(3).err().unwrap(), IndexError::DocNotFound(3)));
    assert!(matches!(db.open_document(99), Err(IndexError::DocNotFound(99))));
    let doc = db.open_document(5).unwrap();
    assert_eq!(doc.length, 2);
    assert_eq!(doc.meta().unwrap().external_id, "five");
}

#[test]
fn write_paths_are_not_implemented() {
    let dir = tempdir().unwrap();
    let db = build_tiny_index(dir.path());
    assert!(matches!(db.make_term(b"new"), Err(IndexError::NotImplemented(_))));
    assert!(matches!(db.make_doc(b"data"), Err(IndexError::NotImplemented(_))));
    assert!(matches!(db.make_posting(b"new", 1, 1), Err(IndexError::NotImplemented(_))));
}

#[test]
fn terminfo_cache_fills_on_demand() {
    let dir = tempdir().unwrap();
    let db = build_tiny_index(dir.path());
    assert_eq!(db.dictionary().cached_terms(), 0);
    db.open_posting_list(b"cat").unwrap();
    db.open_posting_list(b"cat").unwrap();
    assert!(db.term_exists(b"bird"));
    assert_eq!(db.dictionary().cached_terms(), 2);
    assert_eq!(db.dictionary().term_count(), 4);
}

#[test]
fn shared_handle_across_threads() {
    let dir = tempdir().unwrap();
    let db = build_tiny_index(dir.path());
    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for term in [&b"cat"[..], b"dog", b"bird", b"fish"] {
                    assert!(db.term_exists(term));
                    let mut pl = db.open_posting_list(term).unwrap();
                    assert_eq!(drain(pl.as_mut()).len() as u32, pl.termfreq());
                }
            });
        }
    });
    assert_eq!(db.dictionary().cached_terms(), 4);
}

#[test]
fn truncated_postings_surface_as_corruption() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path());
    let mut b = IndexBuilder::new();
    b.add_document(1, vec![], [("cat", 1)]).unwrap();
    b.add_document(2, vec![], [("cat", 1)]).unwrap();
    let (_, termvecs) = b.to_bytes().unwrap();

    // claims three postings but carries two
    let mut run = Vec::new();
    for _ in 0..2 {
        put_varint(&mut run, 1);
        put_f32(&mut run, 1.0);
    }
    let mut records = Vec::new();
    put_term_key(&mut records, b"cat");
    put_varint(&mut records, 3);
    put_varint(&mut records, run.len() as u64);
    records.extend_from_slice(&run);
    let postings =
        encode_store(StoreKind::Postings, 2, 2, 1, &records, |base| base.to_le_bytes().to_vec()).unwrap();
    fs::write(paths.postings(), postings).unwrap();
    fs::write(paths.termvecs(), termvecs).unwrap();

    let db = Database::open(&DatabaseParams::new(dir.path())).unwrap();
    let mut pl = db.open_posting_list(b"cat").unwrap();
    pl.next(0.0).unwrap();
    pl.next(0.0).unwrap();
    assert_eq!(pl.current_doc_id().unwrap(), 2);
    let err = pl.next(0.0).unwrap_err();
    assert!(err.is_corruption(), "got {err:?}");
}

/// Writes real postings for doc 1 (`cat`, `dog`) next to a term vector
/// store whose single record for doc 1 is built from raw parts.
fn index_with_raw_term_vector(dir: &Path, term_count: u64, entries: &[u8]) -> Database {
    let paths = IndexPaths::new(dir);
    let mut b = IndexBuilder::new();
    b.add_document(1, vec![], [("cat", 1), ("dog", 1)]).unwrap();
    let (postings, _) = b.to_bytes().unwrap();

    let mut records = Vec::new();
    put_varint(&mut records, 2);
    put_varint(&mut records, 0);
    put_varint(&mut records, term_count);
    put_varint(&mut records, entries.len() as u64);
    records.extend_from_slice(entries);
    let termvecs = encode_store(StoreKind::TermVectors, 1, 2, 1, &records, |base| {
        let mut slot = 1u32.to_le_bytes().to_vec();
        slot.extend_from_slice(&base.to_le_bytes());
        slot
    })
    .unwrap();
    fs::write(paths.postings(), postings).unwrap();
    fs::write(paths.termvecs(), termvecs).unwrap();
    Database::open(&DatabaseParams::new(dir)).unwrap()
}

fn term_vector(terms: &[(&str, u64)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (term, wdf) in terms {
        put_term_key(&mut out, term.as_bytes());
        put_varint(&mut out, *wdf);
    }
    out
}

/// Walks the whole term list, returning the first error.
fn walk_term_list(db: &Database) -> index_core::Result<()> {
    let mut tl = db.open_term_list(1)?;
    tl.next()?;
    while !tl.at_end()? {
        tl.next()?;
    }
    Ok(())
}

#[test]
fn oversized_term_count_surfaces_as_corruption() {
    let dir = tempdir().unwrap();
    let db = index_with_raw_term_vector(dir.path(), u64::from(u32::MAX), &[]);

    let err = db.open_term_list(1).err().expect("record should be rejected");
    assert!(err.is_corruption(), "got {err:?}");

    let rset: RSet = [1].into_iter().collect();
    let err = ExpansionEngine::new(&db).expand(&rset, 5, &AcceptAll, &RelevanceCount).unwrap_err();
    assert!(err.is_corruption(), "got {err:?}");
}

#[test]
fn well_formed_raw_term_vector_walks_cleanly() {
    let dir = tempdir().unwrap();
    let db = index_with_raw_term_vector(dir.path(), 2, &term_vector(&[("cat", 1), ("dog", 1)]));
    walk_term_list(&db).unwrap();
}

#[test]
fn trailing_term_vector_bytes_surface_as_corruption() {
    let dir = tempdir().unwrap();
    let db = index_with_raw_term_vector(dir.path(), 1, &term_vector(&[("cat", 1), ("dog", 1)]));

    let mut tl = db.open_term_list(1).unwrap();
    tl.next().unwrap();
    assert_eq!(tl.current_term().unwrap(), b"cat");
    let err = tl.next().unwrap_err();
    assert!(err.is_corruption(), "got {err:?}");
}

#[test]
fn out_of_order_term_vector_surfaces_as_corruption() {
    let dir = tempdir().unwrap();
    let db = index_with_raw_term_vector(dir.path(), 2, &term_vector(&[("dog", 1), ("cat", 1)]));
    let err = walk_term_list(&db).unwrap_err();
    assert!(err.is_corruption(), "got {err:?}");
}

#[test]
fn duplicate_term_in_vector_surfaces_as_corruption() {
    let dir = tempdir().unwrap();
    let db = index_with_raw_term_vector(dir.path(), 2, &term_vector(&[("cat", 1), ("cat", 1)]));
    let err = walk_term_list(&db).unwrap_err();
    assert!(err.is_corruption(), "got {err:?}");

    // no double counting: expansion fails instead of reporting rtermfreq 2
    let rset: RSet = [1].into_iter().collect();
    let err = ExpansionEngine::new(&db).expand(&rset, 5, &AcceptAll, &RelevanceCount).unwrap_err();
    assert!(err.is_corruption(), "got {err:?}");
}

#[test]
fn unknown_term_in_vector_surfaces_as_corruption() {
    let dir = tempdir().unwrap();
    let db = index_with_raw_term_vector(dir.path(), 2, &term_vector(&[("cat", 1), ("emu", 1)]));
    let err = walk_term_list(&db).unwrap_err();
    assert!(err.is_corruption(), "got {err:?}");
}
