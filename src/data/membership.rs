use std::collections::HashSet;

use bson::{doc, Document};
use mongodb::{Client, ClientSession, Database};
use rocket::futures::FutureExt;
use uuid::Uuid;

use super::batch::Batch;
use super::student::Student;
use super::test::Test;
use super::{filter, guard, id_list, now_bson, txn, uuid_bson};
use crate::error::{EntityKind, ServiceError};

/// The legal owner/related pairs. Every cross-entity id list in the data
/// model is written through exactly one of these; nothing else in the
/// crate touches the other side of a relation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Relation {
    /// `students.assigned_batches` ↔ `batches.students`
    StudentBatches,
    /// `students.assigned_tests`, one-way direct assignment
    StudentTests,
    /// `students.assigned_shifts` ↔ `shifts.students`
    StudentShifts,
    /// `batches.students` ↔ `students.assigned_batches`
    BatchStudents,
    /// `batches.tests` ↔ `tests.assigned_batches`
    BatchTests,
}

impl Relation {
    pub fn owner_kind(self) -> EntityKind {
        match self {
            Relation::StudentBatches | Relation::StudentTests | Relation::StudentShifts => {
                EntityKind::Student
            }
            Relation::BatchStudents | Relation::BatchTests => EntityKind::Batch,
        }
    }

    pub fn related_kind(self) -> EntityKind {
        match self {
            Relation::StudentBatches => EntityKind::Batch,
            Relation::StudentTests => EntityKind::Test,
            Relation::StudentShifts => EntityKind::Shift,
            Relation::BatchStudents => EntityKind::Student,
            Relation::BatchTests => EntityKind::Test,
        }
    }

    pub fn owner_field(self) -> &'static str {
        match self {
            Relation::StudentBatches => "assigned_batches",
            Relation::StudentTests => "assigned_tests",
            Relation::StudentShifts => "assigned_shifts",
            Relation::BatchStudents => "students",
            Relation::BatchTests => "tests",
        }
    }

    /// The field on the related entity pointing back at the owner's kind,
    /// if the relation is symmetric.
    pub fn back_field(self) -> Option<&'static str> {
        match self {
            Relation::StudentBatches => Some("students"),
            Relation::StudentTests => None,
            Relation::StudentShifts => Some("students"),
            Relation::BatchStudents => Some("assigned_batches"),
            Relation::BatchTests => Some("assigned_batches"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Mode {
    Replace,
    Add,
    Remove,
}

/// Replaces the owner's relation list wholesale, reconciling every
/// back-reference so the symmetry invariant holds afterwards.
pub async fn replace_members(
    client: &Client,
    db: &Database,
    owner_id: Uuid,
    desired: Vec<Uuid>,
    relation: Relation,
) -> Result<(), ServiceError> {
    apply(client, db, owner_id, desired, relation, Mode::Replace).await
}

/// Adds ids to the owner's relation list. Ids already present are no-ops.
pub async fn add_members(
    client: &Client,
    db: &Database,
    owner_id: Uuid,
    ids: Vec<Uuid>,
    relation: Relation,
) -> Result<(), ServiceError> {
    apply(client, db, owner_id, ids, relation, Mode::Add).await
}

/// Removes ids from the owner's relation list. Absent ids are no-ops, so
/// removal also works for references whose target has since vanished.
pub async fn remove_members(
    client: &Client,
    db: &Database,
    owner_id: Uuid,
    ids: Vec<Uuid>,
    relation: Relation,
) -> Result<(), ServiceError> {
    apply(client, db, owner_id, ids, relation, Mode::Remove).await
}

/// In-session variant of [`add_members`] for facade operations that need
/// to compose membership changes with other writes in one transaction
/// (batch creation with initial rosters, for example).
pub(crate) async fn add_members_in_session(
    db: &Database,
    session: &mut ClientSession,
    owner_id: Uuid,
    ids: Vec<Uuid>,
    relation: Relation,
) -> Result<(), ServiceError> {
    apply_in_session(db, session, owner_id, ids, relation, Mode::Add).await
}

async fn apply(
    client: &Client,
    db: &Database,
    owner_id: Uuid,
    ids: Vec<Uuid>,
    relation: Relation,
    mode: Mode,
) -> Result<(), ServiceError> {
    txn::with_transaction(client, |session| {
        let db = db.clone();
        let ids = ids.clone();
        async move { apply_in_session(&db, session, owner_id, ids, relation, mode).await }.boxed()
    })
    .await
}

/// One reconciliation step. Runs entirely inside the caller's
/// transaction; any error aborts it with no observable change.
async fn apply_in_session(
    db: &Database,
    session: &mut ClientSession,
    owner_id: Uuid,
    ids: Vec<Uuid>,
    relation: Relation,
    mode: Mode,
) -> Result<(), ServiceError> {
    let owners = db.collection::<Document>(relation.owner_kind().collection_name());

    let owner_doc = owners
        .find_one_with_session(filter::by_id(owner_id), None, session)
        .await?
        .ok_or_else(|| ServiceError::not_found(relation.owner_kind(), owner_id))?;

    let old_list = id_list(&owner_doc, relation.owner_field());
    let old: HashSet<Uuid> = old_list.iter().copied().collect();
    let requested: HashSet<Uuid> = ids.iter().copied().collect();

    let desired: HashSet<Uuid> = match mode {
        Mode::Replace => requested,
        Mode::Add => old.union(&requested).copied().collect(),
        Mode::Remove => old.difference(&requested).copied().collect(),
    };

    let (to_add, to_remove) = membership_diff(&old, &desired);

    if to_add.is_empty() && to_remove.is_empty() {
        // Nothing to reconcile; idempotent repeat of an earlier call.
        return Ok(());
    }

    if !to_add.is_empty() {
        validate_additions(db, session, &owner_doc, &to_add, relation).await?;
    }

    // Stored order: surviving ids keep their position, new ones append in
    // request order. Order carries no meaning, but stable lists keep
    // repeated syncs from churning the documents.
    let ordered: Vec<Uuid> = match mode {
        Mode::Replace => ids.clone(),
        _ => old_list
            .iter()
            .copied()
            .filter(|id| desired.contains(id))
            .chain(to_add.iter().copied())
            .collect(),
    };
    let mut seen = HashSet::new();
    let desired_list: Vec<Uuid> = ordered
        .into_iter()
        .filter(|id| desired.contains(id) && seen.insert(*id))
        .collect();

    owners
        .update_one_with_session(
            filter::by_id(owner_id),
            doc! {
                "$set": {
                    relation.owner_field():
                        desired_list.iter().map(|id| uuid_bson(*id)).collect::<Vec<_>>(),
                    "updated_at": now_bson(),
                }
            },
            None,
            session,
        )
        .await?;

    if let Some(back_field) = relation.back_field() {
        let related = db.collection::<Document>(relation.related_kind().collection_name());

        if !to_add.is_empty() {
            related
                .update_many_with_session(
                    filter::by_ids(&to_add),
                    doc! { "$addToSet": { back_field: uuid_bson(owner_id) } },
                    None,
                    session,
                )
                .await?;
        }

        if !to_remove.is_empty() {
            related
                .update_many_with_session(
                    filter::by_ids(&to_remove),
                    doc! { "$pull": { back_field: uuid_bson(owner_id) } },
                    None,
                    session,
                )
                .await?;
        }
    }

    tracing::debug!(
        owner = %owner_id,
        added = to_add.len(),
        removed = to_remove.len(),
        "membership reconciled"
    );

    Ok(())
}

/// Plain set difference; ordering within the returned lists follows the
/// desired/old iteration and carries no meaning.
fn membership_diff(old: &HashSet<Uuid>, desired: &HashSet<Uuid>) -> (Vec<Uuid>, Vec<Uuid>) {
    let to_add = desired.difference(old).copied().collect();
    let to_remove = old.difference(desired).copied().collect();
    (to_add, to_remove)
}

/// Every id newly entering a relation must exist, and the relation's
/// gates must pass, all read through the transaction's session so the
/// checks see the same snapshot the write will commit against.
async fn validate_additions(
    db: &Database,
    session: &mut ClientSession,
    owner_doc: &Document,
    to_add: &[Uuid],
    relation: Relation,
) -> Result<(), ServiceError> {
    let related = db.collection::<Document>(relation.related_kind().collection_name());

    let mut cursor = related
        .find_with_session(filter::by_ids(to_add), None, session)
        .await?;

    let mut found: Vec<Document> = Vec::new();
    while let Some(doc) = cursor.next(session).await {
        found.push(doc?);
    }

    let found_ids: HashSet<Uuid> = found
        .iter()
        .filter_map(|d| d.get("_id").cloned())
        .filter_map(|b| bson::from_bson(b).ok())
        .collect();

    let missing: Vec<Uuid> = to_add
        .iter()
        .copied()
        .filter(|id| !found_ids.contains(id))
        .collect();

    if !missing.is_empty() {
        return Err(ServiceError::NotFound {
            kind: relation.related_kind(),
            missing,
        });
    }

    match relation {
        Relation::StudentBatches => {
            let student: Student = bson::from_document(owner_doc.clone())?;
            guard::check_eligibility(&student)?;

            for doc in &found {
                let batch: Batch = bson::from_document(doc.clone())?;
                guard::check_batch_open(&batch)?;
                // Symmetry guarantees the owner isn't already a member of
                // a batch it is only now being linked to.
                guard::check_capacity(&batch, 1)?;
            }
        }
        Relation::StudentShifts => {
            let student: Student = bson::from_document(owner_doc.clone())?;
            guard::check_eligibility(&student)?;
        }
        Relation::StudentTests | Relation::BatchTests => {
            for doc in &found {
                let test: Test = bson::from_document(doc.clone())?;
                guard::check_test_active(&test)?;
            }
        }
        Relation::BatchStudents => {
            let batch: Batch = bson::from_document(owner_doc.clone())?;
            guard::check_batch_open(&batch)?;
            // One check for the whole bulk; `to_add` excludes students
            // already in the batch.
            guard::check_capacity(&batch, to_add.len())?;

            for doc in &found {
                let student: Student = bson::from_document(doc.clone())?;
                guard::check_eligibility(&student)?;
            }
        }
    }

    Ok(())
}

/// Deletes a batch and scrubs its id from every student and test that
/// referenced it, in one transaction.
pub async fn delete_batch(
    client: &Client,
    db: &Database,
    batch_id: Uuid,
) -> Result<(), ServiceError> {
    txn::with_transaction(client, |session| {
        let db = db.clone();
        async move {
            let batches = db.collection::<Document>(EntityKind::Batch.collection_name());

            batches
                .find_one_with_session(filter::by_id(batch_id), None, session)
                .await?
                .ok_or_else(|| ServiceError::not_found(EntityKind::Batch, batch_id))?;

            db.collection::<Document>(EntityKind::Student.collection_name())
                .update_many_with_session(
                    filter::referencing("assigned_batches", batch_id),
                    doc! { "$pull": { "assigned_batches": uuid_bson(batch_id) } },
                    None,
                    session,
                )
                .await?;

            db.collection::<Document>(EntityKind::Test.collection_name())
                .update_many_with_session(
                    filter::referencing("assigned_batches", batch_id),
                    doc! { "$pull": { "assigned_batches": uuid_bson(batch_id) } },
                    None,
                    session,
                )
                .await?;

            batches
                .delete_one_with_session(filter::by_id(batch_id), None, session)
                .await?;

            Ok(())
        }
        .boxed()
    })
    .await
}

/// Deletes a test, scrubbing batch and student references and detaching
/// it from any shift scheduled against it.
pub async fn delete_test(client: &Client, db: &Database, test_id: Uuid) -> Result<(), ServiceError> {
    txn::with_transaction(client, |session| {
        let db = db.clone();
        async move {
            let tests = db.collection::<Document>(EntityKind::Test.collection_name());

            tests
                .find_one_with_session(filter::by_id(test_id), None, session)
                .await?
                .ok_or_else(|| ServiceError::not_found(EntityKind::Test, test_id))?;

            db.collection::<Document>(EntityKind::Batch.collection_name())
                .update_many_with_session(
                    filter::referencing("tests", test_id),
                    doc! { "$pull": { "tests": uuid_bson(test_id) } },
                    None,
                    session,
                )
                .await?;

            db.collection::<Document>(EntityKind::Student.collection_name())
                .update_many_with_session(
                    filter::referencing("assigned_tests", test_id),
                    doc! { "$pull": { "assigned_tests": uuid_bson(test_id) } },
                    None,
                    session,
                )
                .await?;

            db.collection::<Document>(EntityKind::Shift.collection_name())
                .update_many_with_session(
                    doc! { "test": uuid_bson(test_id) },
                    doc! { "$unset": { "test": "" } },
                    None,
                    session,
                )
                .await?;

            tests
                .delete_one_with_session(filter::by_id(test_id), None, session)
                .await?;

            Ok(())
        }
        .boxed()
    })
    .await
}

/// Deletes a shift and removes it from every student's assigned set.
/// Results that point at the shift are history and stay untouched.
pub async fn delete_shift(
    client: &Client,
    db: &Database,
    shift_id: Uuid,
) -> Result<(), ServiceError> {
    txn::with_transaction(client, |session| {
        let db = db.clone();
        async move {
            let shifts = db.collection::<Document>(EntityKind::Shift.collection_name());

            shifts
                .find_one_with_session(filter::by_id(shift_id), None, session)
                .await?
                .ok_or_else(|| ServiceError::not_found(EntityKind::Shift, shift_id))?;

            db.collection::<Document>(EntityKind::Student.collection_name())
                .update_many_with_session(
                    filter::referencing("assigned_shifts", shift_id),
                    doc! { "$pull": { "assigned_shifts": uuid_bson(shift_id) } },
                    None,
                    session,
                )
                .await?;

            shifts
                .delete_one_with_session(filter::by_id(shift_id), None, session)
                .await?;

            Ok(())
        }
        .boxed()
    })
    .await
}

/// Deletes a student account together with its results, scrubbing batch
/// and shift rosters.
pub async fn delete_student(
    client: &Client,
    db: &Database,
    student_id: Uuid,
) -> Result<(), ServiceError> {
    txn::with_transaction(client, |session| {
        let db = db.clone();
        async move {
            let students = db.collection::<Document>(EntityKind::Student.collection_name());

            students
                .find_one_with_session(filter::by_id(student_id), None, session)
                .await?
                .ok_or_else(|| ServiceError::not_found(EntityKind::Student, student_id))?;

            db.collection::<Document>(EntityKind::Batch.collection_name())
                .update_many_with_session(
                    filter::referencing("students", student_id),
                    doc! { "$pull": { "students": uuid_bson(student_id) } },
                    None,
                    session,
                )
                .await?;

            db.collection::<Document>(EntityKind::Shift.collection_name())
                .update_many_with_session(
                    filter::referencing("students", student_id),
                    doc! { "$pull": { "students": uuid_bson(student_id) } },
                    None,
                    session,
                )
                .await?;

            db.collection::<Document>(EntityKind::TestResult.collection_name())
                .delete_many_with_session(
                    doc! { "student": uuid_bson(student_id) },
                    None,
                    session,
                )
                .await?;

            students
                .delete_one_with_session(filter::by_id(student_id), None, session)
                .await?;

            Ok(())
        }
        .boxed()
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[Uuid]) -> HashSet<Uuid> {
        ids.iter().copied().collect()
    }

    #[test]
    fn relation_table_is_symmetric_where_expected() {
        for relation in [
            Relation::StudentBatches,
            Relation::StudentShifts,
            Relation::BatchStudents,
            Relation::BatchTests,
        ] {
            assert!(
                relation.back_field().is_some(),
                "{:?} should keep a back-reference",
                relation
            );
        }

        assert_eq!(Relation::StudentTests.back_field(), None);
        assert_eq!(Relation::StudentBatches.owner_kind(), EntityKind::Student);
        assert_eq!(Relation::StudentBatches.related_kind(), EntityKind::Batch);
        assert_eq!(
            Relation::BatchStudents.owner_field(),
            Relation::StudentBatches.back_field().unwrap()
        );
    }

    #[test]
    fn diff_splits_additions_and_removals() {
        let keep = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let new = Uuid::new_v4();

        let (to_add, to_remove) = membership_diff(&set(&[keep, gone]), &set(&[keep, new]));

        assert_eq!(to_add, vec![new]);
        assert_eq!(to_remove, vec![gone]);
    }

    #[test]
    fn diff_of_identical_sets_is_empty() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let (to_add, to_remove) = membership_diff(&set(&[a, b]), &set(&[b, a]));
        assert!(to_add.is_empty());
        assert!(to_remove.is_empty());
    }
}

// Property tests against real storage. They need a MongoDB replica set
// (transactions don't run on standalone servers):
//
//   docker run -d -p 27017:27017 mongo --replSet rs0
//   docker exec <id> mongosh --eval 'rs.initiate()'
//   cargo test -- --ignored
#[cfg(test)]
mod properties {
    use super::*;
    use crate::data::id_set;
    use crate::data::test::{Test, TEST_COLLECTION_NAME};
    use crate::data::{batch::BATCH_COLLECTION_NAME, student::STUDENT_COLLECTION_NAME};
    use chrono::Utc;

    async fn test_db() -> (Client, Database) {
        let uri =
            std::env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
        let client = Client::with_uri_str(&uri)
            .await
            .expect("MongoDB unavailable");
        let db = client.database("typetest_membership_tests");
        (client, db)
    }

    async fn insert_student(db: &Database, approved: bool) -> Uuid {
        let mut student = Student::new(
            Uuid::new_v4().to_string(),
            format!("{}@example.com", Uuid::new_v4()),
            "property test student",
        );
        student.is_approved = approved;

        db.collection::<Student>(STUDENT_COLLECTION_NAME)
            .insert_one(&student, None)
            .await
            .expect("unable to insert test student");
        student.id
    }

    async fn insert_batch(db: &Database, max_students: u32) -> Uuid {
        let batch = Batch {
            id: Uuid::new_v4(),
            name: format!("batch-{}", Uuid::new_v4()),
            description: String::new(),
            created_by: Uuid::new_v4(),
            students: vec![],
            tests: vec![],
            is_active: true,
            max_students,
            start_date: None,
            end_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        db.collection::<Batch>(BATCH_COLLECTION_NAME)
            .insert_one(&batch, None)
            .await
            .expect("unable to insert test batch");
        batch.id
    }

    async fn insert_test_entity(db: &Database) -> Uuid {
        let test = Test {
            id: Uuid::new_v4(),
            title: format!("test-{}", Uuid::new_v4()),
            audio_url: String::new(),
            reference_text: String::new(),
            uploaded_by: Uuid::new_v4(),
            assigned_batches: vec![],
            is_active: true,
            duration_secs: 300,
            created_at: Utc::now(),
        };

        db.collection::<Test>(TEST_COLLECTION_NAME)
            .insert_one(&test, None)
            .await
            .expect("unable to insert test document");
        test.id
    }

    async fn stored_ids(db: &Database, kind: EntityKind, id: Uuid, field: &str) -> HashSet<Uuid> {
        let doc = db
            .collection::<Document>(kind.collection_name())
            .find_one(filter::by_id(id), None)
            .await
            .expect("query failed")
            .expect("entity should exist");
        id_set(&doc, field)
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB replica set reachable via MONGODB_URI"]
    async fn symmetry_holds_after_assign_and_remove() {
        let (client, db) = test_db().await;
        let student = insert_student(&db, true).await;
        let batch = insert_batch(&db, 10).await;

        add_members(&client, &db, batch, vec![student], Relation::BatchStudents)
            .await
            .expect("assignment should succeed");

        assert!(stored_ids(&db, EntityKind::Batch, batch, "students")
            .await
            .contains(&student));
        assert!(
            stored_ids(&db, EntityKind::Student, student, "assigned_batches")
                .await
                .contains(&batch)
        );

        remove_members(&client, &db, batch, vec![student], Relation::BatchStudents)
            .await
            .expect("removal should succeed");

        assert!(!stored_ids(&db, EntityKind::Batch, batch, "students")
            .await
            .contains(&student));
        assert!(
            !stored_ids(&db, EntityKind::Student, student, "assigned_batches")
                .await
                .contains(&batch)
        );
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB replica set reachable via MONGODB_URI"]
    async fn replacing_twice_changes_nothing_the_second_time() {
        let (client, db) = test_db().await;
        let student = insert_student(&db, true).await;
        let b1 = insert_batch(&db, 10).await;
        let b2 = insert_batch(&db, 10).await;

        replace_members(
            &client,
            &db,
            student,
            vec![b1, b2],
            Relation::StudentBatches,
        )
        .await
        .expect("first sync should succeed");

        let after_first = stored_ids(&db, EntityKind::Student, student, "assigned_batches").await;

        replace_members(
            &client,
            &db,
            student,
            vec![b1, b2],
            Relation::StudentBatches,
        )
        .await
        .expect("repeated sync should be a no-op, not an error");

        let after_second = stored_ids(&db, EntityKind::Student, student, "assigned_batches").await;
        assert_eq!(after_first, after_second);
        assert!(stored_ids(&db, EntityKind::Batch, b1, "students")
            .await
            .contains(&student));
        assert!(stored_ids(&db, EntityKind::Batch, b2, "students")
            .await
            .contains(&student));
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB replica set reachable via MONGODB_URI"]
    async fn sync_with_a_missing_target_applies_nothing() {
        let (client, db) = test_db().await;
        let student = insert_student(&db, true).await;
        let real = insert_batch(&db, 10).await;
        let bogus = Uuid::new_v4();

        let err = replace_members(
            &client,
            &db,
            student,
            vec![real, bogus],
            Relation::StudentBatches,
        )
        .await
        .expect_err("sync with a missing batch must fail");

        match err {
            ServiceError::NotFound { kind, missing } => {
                assert_eq!(kind, EntityKind::Batch);
                assert_eq!(missing, vec![bogus]);
            }
            other => panic!("expected NotFound, got {:?}", other),
        }

        assert!(
            stored_ids(&db, EntityKind::Student, student, "assigned_batches")
                .await
                .is_empty(),
            "no partial assignment may survive"
        );
        assert!(stored_ids(&db, EntityKind::Batch, real, "students")
            .await
            .is_empty());
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB replica set reachable via MONGODB_URI"]
    async fn capacity_ceiling_is_enforced_for_bulk_and_single_assignments() {
        let (client, db) = test_db().await;
        let batch = insert_batch(&db, 2).await;
        let s1 = insert_student(&db, true).await;
        let s2 = insert_student(&db, true).await;
        let s3 = insert_student(&db, true).await;

        let err = add_members(
            &client,
            &db,
            batch,
            vec![s1, s2, s3],
            Relation::BatchStudents,
        )
        .await
        .expect_err("three into a two-seat batch must fail");
        assert!(matches!(err, ServiceError::Capacity { .. }));
        assert!(stored_ids(&db, EntityKind::Batch, batch, "students")
            .await
            .is_empty());

        add_members(&client, &db, batch, vec![s1, s2], Relation::BatchStudents)
            .await
            .expect("filling the batch exactly should succeed");

        let err = add_members(&client, &db, batch, vec![s3], Relation::BatchStudents)
            .await
            .expect_err("the batch is full");
        assert!(matches!(err, ServiceError::Capacity { .. }));

        // Existing members don't count against the delta.
        add_members(&client, &db, batch, vec![s1], Relation::BatchStudents)
            .await
            .expect("re-assigning an existing member is a no-op");

        assert_eq!(
            stored_ids(&db, EntityKind::Batch, batch, "students").await,
            vec![s1, s2].into_iter().collect()
        );
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB replica set reachable via MONGODB_URI"]
    async fn eligibility_gate_opens_with_approval() {
        let (client, db) = test_db().await;
        let batch = insert_batch(&db, 10).await;
        let student = insert_student(&db, false).await;

        let err = add_members(&client, &db, batch, vec![student], Relation::BatchStudents)
            .await
            .expect_err("unapproved students can't be assigned");
        assert!(matches!(err, ServiceError::Eligibility { .. }));

        db.collection::<Document>(STUDENT_COLLECTION_NAME)
            .update_one(
                filter::by_id(student),
                doc! { "$set": { "is_approved": true } },
                None,
            )
            .await
            .expect("approval update failed");

        add_members(&client, &db, batch, vec![student], Relation::BatchStudents)
            .await
            .expect("the same call succeeds after approval");
    }

    #[rocket::async_test]
    #[ignore = "requires a MongoDB replica set reachable via MONGODB_URI"]
    async fn deleting_a_batch_scrubs_every_reference() {
        let (client, db) = test_db().await;
        let batch = insert_batch(&db, 10).await;
        let s1 = insert_student(&db, true).await;
        let s2 = insert_student(&db, true).await;
        let t1 = insert_test_entity(&db).await;

        add_members(&client, &db, batch, vec![s1, s2], Relation::BatchStudents)
            .await
            .expect("roster assignment failed");
        add_members(&client, &db, batch, vec![t1], Relation::BatchTests)
            .await
            .expect("test assignment failed");

        delete_batch(&client, &db, batch)
            .await
            .expect("batch deletion failed");

        for student in [s1, s2] {
            assert!(
                !stored_ids(&db, EntityKind::Student, student, "assigned_batches")
                    .await
                    .contains(&batch)
            );
        }
        assert!(!stored_ids(&db, EntityKind::Test, t1, "assigned_batches")
            .await
            .contains(&batch));

        let remaining = db
            .collection::<Document>(EntityKind::Batch.collection_name())
            .find_one(filter::by_id(batch), None)
            .await
            .expect("query failed");
        assert!(remaining.is_none());
    }
}
