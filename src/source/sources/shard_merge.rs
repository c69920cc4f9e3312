use tracing::{debug, warn};

use crate::config::{CutTransform, ExhaustionPolicy};
use crate::constants::shar::PRIMARY_FIELD;
use crate::data::Cut;
use crate::errors::SharError;
use crate::source::backends::{CutManifestReader, FieldItem, FieldStream, open_field_stream};
use crate::source::indexing::ShardDescriptor;
use crate::transport::ShardLocation;
use crate::types::FieldName;
use crate::utils::item_stem;

/// Lockstep walk over one shard's primary manifest and field streams.
///
/// Each step reads one cut and one item from every field stream, attaches
/// non-placeholder items whose stem matches the cut id, stamps the shard
/// origin and applies the shard's transform. Stream handles live exactly as
/// long as this value; after the first error or exhausted stream the merge
/// yields nothing more.
pub struct ShardMerge {
    origin: ShardLocation,
    cuts: Option<CutManifestReader>,
    fields: Vec<(FieldName, Box<dyn FieldStream>)>,
    transform: Option<CutTransform>,
    exhaustion: ExhaustionPolicy,
    finished: bool,
}

impl ShardMerge {
    /// Open every stream named by `descriptor`.
    pub fn open(
        descriptor: &ShardDescriptor,
        transform: Option<CutTransform>,
        exhaustion: ExhaustionPolicy,
    ) -> Result<Self, SharError> {
        let origin = descriptor.primary().clone();
        let cuts = CutManifestReader::open(&origin)?;
        let fields = descriptor
            .field_locations()
            .map(|(field, location)| Ok((field.clone(), open_field_stream(field, location)?)))
            .collect::<Result<Vec<_>, SharError>>()?;
        debug!(
            shard = %origin,
            index = descriptor.index,
            fields = fields.len(),
            "opened shard streams"
        );
        Ok(Self {
            origin,
            cuts: Some(cuts),
            fields,
            transform,
            exhaustion,
            finished: false,
        })
    }

    fn finish(&mut self) {
        self.finished = true;
        self.cuts = None;
        self.fields.clear();
        debug!(shard = %self.origin, "closed shard streams");
    }

    fn fail(&mut self, err: SharError) -> Option<Result<Cut, SharError>> {
        self.finish();
        Some(Err(err))
    }

    fn exhausted(&mut self, field: &str) -> Option<Result<Cut, SharError>> {
        match self.exhaustion {
            ExhaustionPolicy::Strict => {
                let err = SharError::StreamExhausted {
                    shard: self.origin.to_string(),
                    field: field.to_string(),
                };
                self.fail(err)
            }
            ExhaustionPolicy::Lenient => {
                warn!(shard = %self.origin, field, "field stream ended early; ending shard");
                self.finish();
                None
            }
        }
    }

    /// Primary manifest ended: under the strict policy every field must end too.
    fn primary_exhausted(&mut self) -> Option<Result<Cut, SharError>> {
        if self.exhaustion == ExhaustionPolicy::Strict {
            let mut leftover = false;
            let mut failure = None;
            for (_, stream) in &mut self.fields {
                match stream.next() {
                    Some(Err(err)) => {
                        failure = Some(err);
                        break;
                    }
                    Some(Ok(_)) => leftover = true,
                    None => {}
                }
            }
            if let Some(err) = failure {
                return self.fail(err);
            }
            if leftover {
                return self.exhausted(PRIMARY_FIELD);
            }
        }
        self.finish();
        None
    }

    fn attach_fields(&mut self, cut: &mut Cut) -> Result<Step, SharError> {
        for (field, stream) in &mut self.fields {
            let Some(item) = stream.next() else {
                return Ok(Step::Exhausted(field.clone()));
            };
            let FieldItem { value, name } = item?;
            let Some(value) = value else {
                continue;
            };
            if item_stem(&name) != cut.id {
                return Err(SharError::SynchronizationFault {
                    shard: self.origin.to_string(),
                    field: field.clone(),
                    cut_id: cut.id.clone(),
                    item_name: name,
                });
            }
            cut.attach(field.clone(), value);
        }
        Ok(Step::Attached)
    }
}

enum Step {
    Attached,
    Exhausted(FieldName),
}

impl Iterator for ShardMerge {
    type Item = Result<Cut, SharError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let next = self.cuts.as_mut().and_then(Iterator::next);
        let mut cut = match next {
            Some(Ok(cut)) => cut,
            Some(Err(err)) => return self.fail(err),
            None => return self.primary_exhausted(),
        };
        match self.attach_fields(&mut cut) {
            Ok(Step::Attached) => {}
            Ok(Step::Exhausted(field)) => return self.exhausted(&field),
            Err(err) => return self.fail(err),
        }
        cut.shard_origin = Some(self.origin.clone());
        if let Some(transform) = &self.transform {
            cut = transform(cut);
        }
        Some(Ok(cut))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::indexing::ShardResolver;
    use crate::test_support::{
        ArchiveEntry, append_member, write_archive, write_cuts, write_lines,
    };
    use indexmap::IndexMap;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn descriptor(fields: Vec<(&str, ShardLocation)>) -> ShardDescriptor {
        let fields: IndexMap<FieldName, Vec<ShardLocation>> = fields
            .into_iter()
            .map(|(field, location)| (field.to_string(), vec![location]))
            .collect();
        ShardResolver::from_fields(fields)
            .unwrap()
            .descriptors()
            .remove(0)
    }

    #[test]
    fn attaches_archive_and_manifest_fields() {
        let temp = tempdir().unwrap();
        let cuts = write_cuts(temp.path(), "cuts.000000.jsonl", &["a", "b"]);
        let feat = write_archive(
            temp.path(),
            "feat.000000.tar",
            &[
                ArchiveEntry::item("a", "llc", b"fa", json!({"frames": 10})),
                ArchiveEntry::item("b", "llc", b"fb", json!({"frames": 12})),
            ],
        );
        let label = write_lines(
            temp.path(),
            "label.000000.jsonl",
            &[json!({"cut_id": "a"}), json!({"cut_id": "b", "label": "yes"})],
        );
        let shard = descriptor(vec![
            ("cuts", cuts.clone()),
            ("feat", feat),
            ("label", label),
        ]);

        let merged: Vec<Cut> = ShardMerge::open(&shard, None, ExhaustionPolicy::Lenient)
            .unwrap()
            .map(Result::unwrap)
            .collect();

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "a");
        assert_eq!(
            merged[0].field("feat").unwrap().manifest(),
            &json!({"frames": 10})
        );
        assert!(!merged[0].has_field("label"));
        assert_eq!(merged[1].field("feat").unwrap().data(), Some(&b"fb"[..]));
        assert_eq!(merged[1].field("label").unwrap().manifest(), &json!("yes"));
        assert!(merged.iter().all(|cut| cut.shard_origin.as_ref() == Some(&cuts)));
    }

    #[test]
    fn id_mismatch_is_a_synchronization_fault() {
        let temp = tempdir().unwrap();
        let cuts = write_cuts(temp.path(), "cuts.000000.jsonl", &["a", "b", "d"]);
        let feat = write_archive(
            temp.path(),
            "feat.000000.tar",
            &[
                ArchiveEntry::item("a", "llc", b"fa", json!({})),
                ArchiveEntry::item("c", "bin", b"fc", json!({})),
                ArchiveEntry::item("d", "llc", b"fd", json!({})),
            ],
        );
        let shard = descriptor(vec![("cuts", cuts), ("feat", feat)]);
        let mut merge = ShardMerge::open(&shard, None, ExhaustionPolicy::Lenient).unwrap();

        assert_eq!(merge.next().unwrap().unwrap().id, "a");
        match merge.next() {
            Some(Err(SharError::SynchronizationFault {
                field,
                cut_id,
                item_name,
                ..
            })) => {
                assert_eq!(field, "feat");
                assert_eq!(cut_id, "b");
                assert_eq!(item_name, "c.bin");
            }
            other => panic!("expected synchronization fault, got {other:?}"),
        }
        assert!(merge.next().is_none());
    }

    #[test]
    fn placeholders_skip_id_check_and_attachment() {
        let temp = tempdir().unwrap();
        let cuts = write_cuts(temp.path(), "cuts.000000.jsonl", &["a", "b"]);
        let feat = write_archive(
            temp.path(),
            "feat.000000.tar",
            &[
                ArchiveEntry::placeholder("not-a"),
                ArchiveEntry::item("b", "llc", b"fb", json!({})),
            ],
        );
        let shard = descriptor(vec![("cuts", cuts), ("feat", feat)]);
        let merged: Vec<Cut> = ShardMerge::open(&shard, None, ExhaustionPolicy::Strict)
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert!(!merged[0].has_field("feat"));
        assert!(merged[1].has_field("feat"));
    }

    #[test]
    fn short_field_stream_ends_shard_when_lenient() {
        let temp = tempdir().unwrap();
        let cuts = write_cuts(temp.path(), "cuts.000000.jsonl", &["a", "b", "c"]);
        let label = write_lines(
            temp.path(),
            "label.000000.jsonl",
            &[json!({"cut_id": "a", "label": 1})],
        );
        let shard = descriptor(vec![("cuts", cuts), ("label", label)]);
        let ids: Vec<String> = ShardMerge::open(&shard, None, ExhaustionPolicy::Lenient)
            .unwrap()
            .map(|cut| cut.unwrap().id)
            .collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn short_field_stream_fails_when_strict() {
        let temp = tempdir().unwrap();
        let cuts = write_cuts(temp.path(), "cuts.000000.jsonl", &["a", "b"]);
        let label = write_lines(
            temp.path(),
            "label.000000.jsonl",
            &[json!({"cut_id": "a", "label": 1})],
        );
        let shard = descriptor(vec![("cuts", cuts), ("label", label)]);
        let results: Vec<Result<Cut, SharError>> =
            ShardMerge::open(&shard, None, ExhaustionPolicy::Strict)
                .unwrap()
                .collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(
            &results[1],
            Err(SharError::StreamExhausted { field, .. }) if field == "label"
        ));
    }

    #[test]
    fn long_field_stream_fails_when_strict() {
        let temp = tempdir().unwrap();
        let cuts = write_cuts(temp.path(), "cuts.000000.jsonl", &["a"]);
        let label = write_lines(
            temp.path(),
            "label.000000.jsonl",
            &[json!({"cut_id": "a"}), json!({"cut_id": "b"})],
        );
        let shard = descriptor(vec![("cuts", cuts), ("label", label)]);
        let results: Vec<Result<Cut, SharError>> =
            ShardMerge::open(&shard, None, ExhaustionPolicy::Strict)
                .unwrap()
                .collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            &results[1],
            Err(SharError::StreamExhausted { field, .. }) if field == "cuts"
        ));
    }

    #[test]
    fn malformed_trailing_field_item_is_reported_when_strict() {
        let temp = tempdir().unwrap();
        let cuts = write_cuts(temp.path(), "cuts.000000.jsonl", &["a"]);
        let path = temp.path().join("feat.000000.tar");
        let mut builder = tar::Builder::new(std::fs::File::create(&path).unwrap());
        append_member(&mut builder, "a.llc", b"fa");
        append_member(&mut builder, "a.json", b"{}");
        append_member(&mut builder, "b.llc", b"fb");
        builder.finish().unwrap();
        drop(builder);
        let shard = descriptor(vec![("cuts", cuts), ("feat", ShardLocation::from(path))]);

        let results: Vec<Result<Cut, SharError>> =
            ShardMerge::open(&shard, None, ExhaustionPolicy::Strict)
                .unwrap()
                .collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(&results[1], Err(SharError::Archive { .. })));
    }

    #[test]
    fn finished_merge_releases_every_stream() {
        let temp = tempdir().unwrap();
        let cuts = write_cuts(temp.path(), "cuts.000000.jsonl", &["a", "b"]);
        let label = write_lines(
            temp.path(),
            "label.000000.jsonl",
            &[json!({"cut_id": "a"}), json!({"cut_id": "b"})],
        );
        let shard = descriptor(vec![("cuts", cuts), ("label", label)]);

        let mut merge = ShardMerge::open(&shard, None, ExhaustionPolicy::Lenient).unwrap();
        assert!(merge.next().unwrap().is_ok());
        assert!(merge.cuts.is_some());
        assert!(merge.next().unwrap().is_ok());
        assert!(merge.next().is_none());
        assert!(merge.cuts.is_none());
        assert!(merge.fields.is_empty());
        assert!(merge.next().is_none());
    }

    #[test]
    fn failed_merge_releases_primary_reader() {
        let temp = tempdir().unwrap();
        let cuts = write_cuts(temp.path(), "cuts.000000.jsonl", &["a", "b"]);
        let label = write_lines(temp.path(), "label.000000.jsonl", &[json!({"cut_id": "x"})]);
        let shard = descriptor(vec![("cuts", cuts), ("label", label)]);
        // The placeholder skips the id check, so the fault comes from the second cut.
        let mut merge = ShardMerge::open(&shard, None, ExhaustionPolicy::Strict).unwrap();
        assert!(merge.next().unwrap().is_ok());
        assert!(matches!(
            merge.next(),
            Some(Err(SharError::StreamExhausted { .. }))
        ));
        assert!(merge.cuts.is_none());
    }

    #[test]
    fn transform_sees_fully_populated_cut() {
        let temp = tempdir().unwrap();
        let cuts = write_cuts(temp.path(), "cuts.000000.jsonl", &["a"]);
        let label = write_lines(
            temp.path(),
            "label.000000.jsonl",
            &[json!({"cut_id": "a", "label": "x"})],
        );
        let shard = descriptor(vec![("cuts", cuts), ("label", label)]);
        let transform: CutTransform = Arc::new(|cut: Cut| {
            let seen = cut.has_field("label") && cut.shard_origin.is_some();
            let id = format!("{}-t", cut.id);
            Cut { id, ..cut }.with_attribute("saw_fields", json!(seen))
        });
        let merged: Vec<Cut> =
            ShardMerge::open(&shard, Some(transform), ExhaustionPolicy::Lenient)
                .unwrap()
                .map(Result::unwrap)
                .collect();
        assert_eq!(merged[0].id, "a-t");
        assert_eq!(merged[0].attribute("saw_fields"), Some(&json!(true)));
    }
}
