//! Merge and flush logic.
//!
//! Mutations are staged in memory per target path and flushed once per path
//! at the end of the run, so a table contract and a nested column contract
//! writing to the same file never race each other. A file is only written
//! when the rendered document differs from what was read, which makes a
//! second run over unchanged inputs a no-op.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use gavel_core::{
    Catalog, CatalogColumn, CatalogEntry, FieldPolicy, FileStore, GeneratorConfig, GeneratorField,
    Resource, ResourceKind,
};
use tracing::{debug, info};

use crate::document::{ColumnProperties, EntryProperties, PropertiesDoc};

/// One target path touched by a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    /// Whether the file content actually changed
    pub changed: bool,
}

/// A per-file failure. Other files are still processed.
#[derive(Debug)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

/// The result of one generator run.
#[derive(Debug, Default)]
pub struct GenerateOutcome {
    /// All target paths, in path order
    pub files: Vec<GeneratedFile>,
    /// Per-file failures, in path order
    pub errors: Vec<FileError>,
}

struct Staged {
    doc: PropertiesDoc,
    original: Option<String>,
}

/// Synthesizes properties files for tables and sources from catalog data.
pub struct Generator<'a> {
    catalog: &'a Catalog,
    store: &'a dyn FileStore,
    staged: BTreeMap<PathBuf, Staged>,
    errors: Vec<FileError>,
}

impl<'a> Generator<'a> {
    pub fn new(catalog: &'a Catalog, store: &'a dyn FileStore) -> Self {
        Self {
            catalog,
            store,
            staged: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Stages the merge for one resource under the given policies.
    ///
    /// `column_config` carries the nested column contract's policies, when
    /// one was declared, and `column_scope` the names of the columns that
    /// contract's filters put in scope: columns outside it never receive
    /// column-level updates. `None` means every column is in scope.
    /// Resources without a catalog entry are skipped.
    pub fn stage(
        &mut self,
        resource: &Resource,
        config: &GeneratorConfig,
        column_config: Option<&GeneratorConfig>,
        column_scope: Option<&BTreeSet<String>>,
    ) {
        if !matches!(resource.kind(), ResourceKind::Table | ResourceKind::Source) {
            return;
        }
        let Some(entry) = self.catalog.entry(resource.unique_id()) else {
            debug!(resource = resource.unique_id(), "no catalog entry, skipped");
            return;
        };

        let path = target_path(resource, config);
        let Some(staged) = self.load(&path) else {
            return;
        };

        let properties = match resource.kind() {
            ResourceKind::Source => staged.doc.source_entry(resource.name()),
            _ => staged.doc.table_entry(resource.name()),
        };
        merge_entry(properties, entry, config, column_config, column_scope);
    }

    fn load(&mut self, path: &Path) -> Option<&mut Staged> {
        if !self.staged.contains_key(path) {
            let original = match self.store.read(path) {
                Ok(original) => original,
                Err(err) => {
                    self.errors.push(FileError {
                        path: path.to_path_buf(),
                        message: err.to_string(),
                    });
                    return None;
                }
            };
            let doc = match original.as_deref().map(PropertiesDoc::parse).transpose() {
                Ok(doc) => doc.unwrap_or_default(),
                Err(err) => {
                    self.errors.push(FileError {
                        path: path.to_path_buf(),
                        message: err.to_string(),
                    });
                    return None;
                }
            };
            self.staged
                .insert(path.to_path_buf(), Staged { doc, original });
        }
        self.staged.get_mut(path)
    }

    /// Flushes every staged document, writing only the ones that changed.
    pub fn flush(mut self) -> GenerateOutcome {
        let mut outcome = GenerateOutcome {
            files: Vec::new(),
            errors: self.errors,
        };

        for (path, staged) in std::mem::take(&mut self.staged) {
            let rendered = match staged.doc.render() {
                Ok(rendered) => rendered,
                Err(err) => {
                    outcome.errors.push(FileError {
                        path,
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            let changed = staged.original.as_deref() != Some(rendered.as_str());
            if changed {
                if let Err(err) = self.store.write(&path, &rendered) {
                    outcome.errors.push(FileError {
                        path,
                        message: err.to_string(),
                    });
                    continue;
                }
            }
            outcome.files.push(GeneratedFile { path, changed });
        }

        info!(
            written = outcome.files.iter().filter(|f| f.changed).count(),
            unchanged = outcome.files.iter().filter(|f| !f.changed).count(),
            errors = outcome.errors.len(),
            "generator run finished"
        );
        outcome
    }
}

/// Where a resource's properties live: its declared properties file, or a new
/// file named `<filename>.yml` placed `depth` directories above its own file.
fn target_path(resource: &Resource, config: &GeneratorConfig) -> PathBuf {
    if let Some(path) = resource.properties_path() {
        return path.to_path_buf();
    }
    let mut dir = resource.path().parent().unwrap_or(Path::new("")).to_path_buf();
    for _ in 0..config.depth {
        dir.pop();
    }
    dir.join(format!("{}.yml", config.filename))
}

fn merge_entry(
    properties: &mut EntryProperties,
    entry: &CatalogEntry,
    config: &GeneratorConfig,
    column_config: Option<&GeneratorConfig>,
    column_scope: Option<&BTreeSet<String>>,
) {
    if !config.exclude.contains(&GeneratorField::Description) {
        apply_text(
            &mut properties.description,
            entry.comment.as_deref(),
            &config.description,
        );
    }

    if !config.exclude.contains(&GeneratorField::Columns) {
        merge_columns(properties, entry, config, column_config, column_scope);
    }
}

fn in_scope(scope: Option<&BTreeSet<String>>, name: &str) -> bool {
    scope.is_none_or(|names| names.iter().any(|n| n.eq_ignore_ascii_case(name)))
}

fn merge_columns(
    properties: &mut EntryProperties,
    entry: &CatalogEntry,
    config: &GeneratorConfig,
    column_config: Option<&GeneratorConfig>,
    column_scope: Option<&BTreeSet<String>>,
) {
    if config.columns.remove {
        properties
            .columns
            .retain(|column| entry.column(&column.name, false).is_some());
    }

    for catalog_column in &entry.columns {
        let declared = properties
            .columns
            .iter_mut()
            .find(|column| column.name.eq_ignore_ascii_case(&catalog_column.name));
        match declared {
            Some(column) => {
                if let Some(column_config) = column_config {
                    if in_scope(column_scope, &column.name) {
                        update_column(column, catalog_column, column_config);
                    }
                }
            }
            None if config.columns.add => {
                properties.columns.push(ColumnProperties {
                    name: catalog_column.name.clone(),
                    data_type: Some(catalog_column.data_type.clone()),
                    description: catalog_column.comment.clone(),
                    extra: BTreeMap::new(),
                });
            }
            None => {}
        }
    }

    if config.columns.order {
        properties.columns.sort_by_key(|column| {
            entry
                .column(&column.name, false)
                .map(|catalog_column| catalog_column.index)
                .unwrap_or(usize::MAX)
        });
    }
}

fn update_column(
    column: &mut ColumnProperties,
    catalog_column: &CatalogColumn,
    config: &GeneratorConfig,
) {
    if !config.exclude.contains(&GeneratorField::DataType) {
        apply_text(
            &mut column.data_type,
            Some(&catalog_column.data_type),
            &config.data_type,
        );
    }
    if !config.exclude.contains(&GeneratorField::Description) {
        apply_text(
            &mut column.description,
            catalog_column.comment.as_deref(),
            &config.description,
        );
    }
}

/// Applies a field policy: fill when empty, replace only with `overwrite`,
/// truncating the incoming text at the policy's terminator.
fn apply_text(field: &mut Option<String>, incoming: Option<&str>, policy: &FieldPolicy) {
    let Some(incoming) = incoming.filter(|text| !text.is_empty()) else {
        return;
    };
    let occupied = field.as_deref().is_some_and(|text| !text.is_empty());
    if occupied && !policy.overwrite {
        return;
    }

    let text = match &policy.terminator {
        Some(terminator) => incoming
            .split(terminator.as_str())
            .next()
            .unwrap_or(incoming),
        None => incoming,
    };
    let text = text.trim_end();
    if field.as_deref() != Some(text) {
        *field = Some(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Mutex;

    use gavel_core::{Catalog, ColumnPolicy, Node};
    use pretty_assertions::assert_eq;

    use super::*;

    /// In-memory store for tests.
    #[derive(Debug, Default)]
    struct MemoryFileStore {
        files: Mutex<BTreeMap<PathBuf, String>>,
        writes: Mutex<usize>,
    }

    impl MemoryFileStore {
        fn with(path: &str, content: &str) -> Self {
            let store = Self::default();
            store
                .files
                .lock()
                .unwrap()
                .insert(PathBuf::from(path), content.to_string());
            store
        }

        fn content(&self, path: &str) -> Option<String> {
            self.files.lock().unwrap().get(Path::new(path)).cloned()
        }

        fn write_count(&self) -> usize {
            *self.writes.lock().unwrap()
        }
    }

    impl FileStore for MemoryFileStore {
        fn read(&self, path: &Path) -> io::Result<Option<String>> {
            Ok(self.files.lock().unwrap().get(path).cloned())
        }

        fn write(&self, path: &Path, content: &str) -> io::Result<()> {
            *self.writes.lock().unwrap() += 1;
            self.files
                .lock()
                .unwrap()
                .insert(path.to_path_buf(), content.to_string());
            Ok(())
        }
    }

    fn orders_table() -> Resource {
        Resource::Table(Node {
            unique_id: "table.demo.orders".into(),
            name: "orders".into(),
            path: "tables/mart/orders.sql".into(),
            ..Node::default()
        })
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![CatalogEntry {
            unique_id: "table.demo.orders".into(),
            comment: Some("One row per order. Internal note".into()),
            columns: vec![
                CatalogColumn {
                    name: "id".into(),
                    data_type: "BIGINT".into(),
                    comment: Some("Order ID".into()),
                    index: 0,
                },
                CatalogColumn {
                    name: "status".into(),
                    data_type: "VARCHAR".into(),
                    comment: None,
                    index: 1,
                },
            ],
        }])
    }

    #[test]
    fn creates_properties_file_next_to_the_resource() {
        let catalog = catalog();
        let store = MemoryFileStore::default();
        let mut generator = Generator::new(&catalog, &store);

        generator.stage(&orders_table(), &GeneratorConfig::default(), None, None);
        let outcome = generator.flush();

        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.files.len(), 1);
        assert_eq!(
            outcome.files[0].path,
            PathBuf::from("tables/mart/_properties.yml")
        );
        assert!(outcome.files[0].changed);

        let content = store.content("tables/mart/_properties.yml").unwrap();
        let doc = PropertiesDoc::parse(&content).unwrap();
        assert_eq!(doc.tables[0].name, "orders");
        assert_eq!(doc.tables[0].columns.len(), 2);
        assert_eq!(doc.tables[0].columns[0].data_type.as_deref(), Some("BIGINT"));
    }

    #[test]
    fn depth_and_filename_control_new_file_placement() {
        let catalog = catalog();
        let store = MemoryFileStore::default();
        let mut generator = Generator::new(&catalog, &store);

        let config = GeneratorConfig {
            depth: 1,
            filename: "_schema".to_string(),
            ..GeneratorConfig::default()
        };
        generator.stage(&orders_table(), &config, None, None);
        let outcome = generator.flush();
        assert_eq!(outcome.files[0].path, PathBuf::from("tables/_schema.yml"));
    }

    #[test]
    fn second_run_with_unchanged_inputs_writes_nothing() {
        let catalog = catalog();
        let store = MemoryFileStore::default();

        let mut generator = Generator::new(&catalog, &store);
        generator.stage(&orders_table(), &GeneratorConfig::default(), None, None);
        generator.flush();
        assert_eq!(store.write_count(), 1);

        let mut generator = Generator::new(&catalog, &store);
        generator.stage(&orders_table(), &GeneratorConfig::default(), None, None);
        let outcome = generator.flush();
        assert_eq!(store.write_count(), 1);
        assert!(!outcome.files[0].changed);
    }

    #[test]
    fn description_respects_overwrite_and_terminator() {
        let catalog = catalog();
        let existing = concat!(
            "tables:\n",
            "- name: orders\n",
            "  description: Hand-written\n",
        );
        let store = MemoryFileStore::with("tables/mart/_properties.yml", existing);

        // without overwrite the hand-written text stays
        let mut generator = Generator::new(&catalog, &store);
        generator.stage(&orders_table(), &GeneratorConfig::default(), None, None);
        generator.flush();
        let doc = PropertiesDoc::parse(&store.content("tables/mart/_properties.yml").unwrap())
            .unwrap();
        assert_eq!(doc.tables[0].description.as_deref(), Some("Hand-written"));

        // with overwrite, the catalog comment is truncated at the terminator
        let config = GeneratorConfig {
            description: FieldPolicy {
                overwrite: true,
                terminator: Some(".".to_string()),
            },
            ..GeneratorConfig::default()
        };
        let mut generator = Generator::new(&catalog, &store);
        generator.stage(&orders_table(), &config, None, None);
        generator.flush();
        let doc = PropertiesDoc::parse(&store.content("tables/mart/_properties.yml").unwrap())
            .unwrap();
        assert_eq!(
            doc.tables[0].description.as_deref(),
            Some("One row per order")
        );
    }

    #[test]
    fn column_policies_add_remove_and_order() {
        let catalog = catalog();
        let existing = concat!(
            "tables:\n",
            "- name: orders\n",
            "  columns:\n",
            "  - name: legacy\n",
            "  - name: status\n",
        );
        let store = MemoryFileStore::with("tables/mart/_properties.yml", existing);

        let config = GeneratorConfig {
            columns: ColumnPolicy {
                add: true,
                remove: true,
                order: true,
            },
            ..GeneratorConfig::default()
        };
        let mut generator = Generator::new(&catalog, &store);
        generator.stage(&orders_table(), &config, None, None);
        let outcome = generator.flush();
        assert!(outcome.errors.is_empty());

        let doc = PropertiesDoc::parse(&store.content("tables/mart/_properties.yml").unwrap())
            .unwrap();
        let names: Vec<&str> = doc.tables[0]
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "status"]);
    }

    #[test]
    fn column_updates_stay_within_the_scoped_set() {
        let catalog = catalog();
        let existing = concat!(
            "tables:\n",
            "- name: orders\n",
            "  columns:\n",
            "  - name: id\n",
            "    description: Hand id\n",
            "  - name: status\n",
            "    description: Hand status\n",
        );
        let store = MemoryFileStore::with("tables/mart/_properties.yml", existing);

        let column_config = GeneratorConfig {
            description: FieldPolicy {
                overwrite: true,
                terminator: None,
            },
            ..GeneratorConfig::default()
        };
        let scope: BTreeSet<String> = ["id".to_string()].into();

        let mut generator = Generator::new(&catalog, &store);
        generator.stage(
            &orders_table(),
            &GeneratorConfig::default(),
            Some(&column_config),
            Some(&scope),
        );
        let outcome = generator.flush();
        assert!(outcome.errors.is_empty());

        let doc = PropertiesDoc::parse(&store.content("tables/mart/_properties.yml").unwrap())
            .unwrap();
        // the in-scope column takes the catalog comment, the out-of-scope
        // one keeps its hand-written text
        assert_eq!(doc.tables[0].columns[0].description.as_deref(), Some("Order ID"));
        assert_eq!(
            doc.tables[0].columns[1].description.as_deref(),
            Some("Hand status")
        );
    }

    #[test]
    fn exclude_suppresses_whole_fields() {
        let catalog = catalog();
        let store = MemoryFileStore::default();

        let config = GeneratorConfig {
            exclude: vec![GeneratorField::Description, GeneratorField::Columns],
            ..GeneratorConfig::default()
        };
        let mut generator = Generator::new(&catalog, &store);
        generator.stage(&orders_table(), &config, None, None);
        generator.flush();

        let doc = PropertiesDoc::parse(&store.content("tables/mart/_properties.yml").unwrap())
            .unwrap();
        assert!(doc.tables[0].description.is_none());
        assert!(doc.tables[0].columns.is_empty());
    }

    #[test]
    fn resources_without_catalog_entry_are_skipped() {
        let catalog = Catalog::new(Vec::new());
        let store = MemoryFileStore::default();
        let mut generator = Generator::new(&catalog, &store);
        generator.stage(&orders_table(), &GeneratorConfig::default(), None, None);
        let outcome = generator.flush();
        assert!(outcome.files.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn unparseable_file_is_an_error_not_a_panic() {
        let catalog = catalog();
        let store = MemoryFileStore::with("tables/mart/_properties.yml", "tables: {broken");
        let mut generator = Generator::new(&catalog, &store);
        generator.stage(&orders_table(), &GeneratorConfig::default(), None, None);
        let outcome = generator.flush();
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.files.is_empty());
    }
}
