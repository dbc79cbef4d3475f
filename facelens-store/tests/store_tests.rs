use facelens_core::{BoundingBox, Gender, RefinedFace};
use facelens_store::{AnalysisStore, MemoryStore, NewAnalysis, NewUser, SqliteStore, StoreError};

fn sample_face() -> RefinedFace {
    RefinedFace {
        id: "face-1".into(),
        bbox: BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
        },
        age: 27.0,
        age_confidence: 88.0,
        gender: Gender::Female,
        gender_confidence: 91.0,
        landmarks: None,
    }
}

fn analysis(name: &str) -> NewAnalysis {
    NewAnalysis {
        image_file_name: name.into(),
        width: 800,
        height: 600,
        faces: vec![sample_face()],
        processing_time: Some("0.8s".into()),
    }
}

fn backends() -> Vec<Box<dyn AnalysisStore>> {
    vec![
        Box::new(MemoryStore::new()),
        Box::new(SqliteStore::open_in_memory().expect("sqlite")),
    ]
}

#[test]
fn create_then_get_round_trips_faces() {
    for store in backends() {
        let created = store.create_analysis(analysis("one.jpg")).expect("create");
        assert!(!created.id.is_empty());

        let fetched = store
            .analysis_by_id(&created.id)
            .expect("get")
            .expect("record exists");
        assert_eq!(fetched.image_file_name, "one.jpg");
        assert_eq!(fetched.width, 800);
        assert_eq!(fetched.faces, vec![sample_face()]);
        assert_eq!(fetched.processing_time.as_deref(), Some("0.8s"));
        assert_eq!(fetched.created_at, created.created_at);

        // Creation timestamps carry no sub-microsecond precision, so the
        // record returned by create is byte-for-byte what a fetch reads back.
        assert_eq!(created.created_at.timestamp_subsec_nanos() % 1_000, 0);
    }
}

#[test]
fn unknown_id_returns_none() {
    for store in backends() {
        assert!(store.analysis_by_id("nope").expect("get").is_none());
    }
}

#[test]
fn recent_is_newest_first_and_limited() {
    for store in backends() {
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            store.create_analysis(analysis(name)).expect("create");
        }

        let recent = store.recent_analyses(2).expect("list");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].image_file_name, "c.jpg");
        assert_eq!(recent[1].image_file_name, "b.jpg");

        let all = store.recent_analyses(10).expect("list");
        assert_eq!(all.len(), 3);
    }
}

#[test]
fn invalid_analyses_are_rejected() {
    for store in backends() {
        let mut bad = analysis("x.jpg");
        bad.image_file_name = "".into();
        assert!(matches!(
            store.create_analysis(bad),
            Err(StoreError::Invalid(_))
        ));

        let mut bad = analysis("x.jpg");
        bad.height = 0;
        assert!(matches!(
            store.create_analysis(bad),
            Err(StoreError::Invalid(_))
        ));
    }
}

#[test]
fn users_create_and_lookup() {
    for store in backends() {
        let user = store
            .create_user(NewUser {
                username: "ada".into(),
                password: "secret".into(),
            })
            .expect("create user");

        let found = store
            .user_by_username("ada")
            .expect("lookup")
            .expect("user exists");
        assert_eq!(found.id, user.id);
        assert!(store.user_by_username("bob").expect("lookup").is_none());

        // Duplicate usernames are rejected by both backends.
        assert!(store
            .create_user(NewUser {
                username: "ada".into(),
                password: "other".into(),
            })
            .is_err());
    }
}

#[test]
fn sqlite_records_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("analyses.db");

    let id = {
        let store = SqliteStore::open(&path).expect("open");
        store.create_analysis(analysis("kept.jpg")).expect("create").id
    };

    let store = SqliteStore::open(&path).expect("reopen");
    let fetched = store
        .analysis_by_id(&id)
        .expect("get")
        .expect("record survived");
    assert_eq!(fetched.image_file_name, "kept.jpg");
}
