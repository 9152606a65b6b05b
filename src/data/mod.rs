use std::collections::HashSet;

use bson::{Bson, Document};
use chrono::Utc;
use uuid::Uuid;

pub mod guard;
pub mod id;
pub mod membership;
pub mod txn;

pub mod admin;
pub mod auth;
pub mod batch;
pub mod result;
pub mod shift;
pub mod student;
pub mod test;

/// The BSON form of an id, as serde would have written it into a
/// document. Filters and `$addToSet`/`$pull` updates must go through this
/// so query values always match stored ones.
pub fn uuid_bson(id: Uuid) -> Bson {
    bson::to_bson(&id).expect("UUID is always BSON serializable")
}

/// Unique indexes backing the uniqueness rules the facade checks for
/// (email, auth subject, batch name). The checks give friendly errors,
/// the indexes close the race.
pub async fn ensure_indexes(db: &mongodb::Database) -> Result<(), mongodb::error::Error> {
    use bson::doc;
    use mongodb::options::IndexOptions;
    use mongodb::IndexModel;

    fn unique_on(field: &str) -> IndexModel {
        IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build()
    }

    for collection in [
        crate::error::EntityKind::Student,
        crate::error::EntityKind::Admin,
    ] {
        let handle = db.collection::<Document>(collection.collection_name());
        handle.create_index(unique_on("email"), None).await?;
        handle.create_index(unique_on("subject_id"), None).await?;
    }

    db.collection::<Document>(crate::error::EntityKind::Batch.collection_name())
        .create_index(unique_on("name"), None)
        .await?;

    Ok(())
}

pub fn now_bson() -> Bson {
    bson::to_bson(&Utc::now()).expect("timestamps are always BSON serializable")
}

pub mod filter {
    use super::uuid_bson;
    use bson::{doc, Document};
    use uuid::Uuid;

    #[inline]
    pub fn by_id(id: Uuid) -> Document {
        doc! { "_id": uuid_bson(id) }
    }

    #[inline]
    pub fn by_ids(ids: &[Uuid]) -> Document {
        doc! { "_id": { "$in": ids.iter().map(|id| uuid_bson(*id)).collect::<Vec<_>>() } }
    }

    /// Matches documents whose `field` id-list contains `id`.
    #[inline]
    pub fn referencing(field: &str, id: Uuid) -> Document {
        doc! { field: uuid_bson(id) }
    }
}

/// Reads an id list off a raw document in stored order, treating a
/// missing field as empty and skipping values that don't parse as ids.
pub fn id_list(doc: &Document, field: &str) -> Vec<Uuid> {
    match doc.get_array(field) {
        Ok(values) => values
            .iter()
            .filter_map(|b| bson::from_bson::<Uuid>(b.clone()).ok())
            .collect(),
        Err(_) => Vec::new(),
    }
}

pub fn id_set(doc: &Document, field: &str) -> HashSet<Uuid> {
    id_list(doc, field).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn uuid_bson_matches_serialized_documents() {
        #[derive(Serialize)]
        struct Probe {
            id: Uuid,
        }

        let id = Uuid::new_v4();
        let doc = bson::to_document(&Probe { id }).unwrap();

        assert_eq!(doc.get("id"), Some(&uuid_bson(id)));
    }

    #[test]
    fn id_set_skips_junk_and_missing_fields() {
        let a = Uuid::new_v4();
        let doc = doc! { "members": [uuid_bson(a), "not-an-id", 7] };

        let set = id_set(&doc, "members");
        assert_eq!(set.len(), 1);
        assert!(set.contains(&a));

        assert!(id_set(&doc, "absent").is_empty());
    }
}
