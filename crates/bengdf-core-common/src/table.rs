//! Key-unique, ordered collections of rows.

use std::collections::{BTreeSet, HashMap};

use crate::crs::Crs;
use crate::error::{PatchError, PatchResult};
use crate::row::{DerivedColumn, DerivedValue, Row};

/// An ordered collection of [`Row`]s keyed by patch name.
///
/// All geometries of a table are expressed in the table's CRS, and the table
/// records which [`DerivedColumn`]s it holds. Rows are only changed through
/// [`Table::join_derived`], which returns a new table.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    crs: Crs,
    rows: Vec<Row>,
    index: HashMap<String, usize>,
    columns: BTreeSet<DerivedColumn>,
}

/// Values computed for one patch, to be merged by key.
pub type DerivedUpdate = (String, Vec<DerivedValue>);

impl Table {
    /// An empty table without derived columns.
    #[must_use]
    pub fn new(crs: Crs) -> Self {
        Self::with_columns(crs, [])
    }

    /// An empty table holding the given derived columns.
    #[must_use]
    pub fn with_columns(crs: Crs, columns: impl IntoIterator<Item = DerivedColumn>) -> Self {
        Self {
            crs,
            rows: Vec::new(),
            index: HashMap::new(),
            columns: columns.into_iter().collect(),
        }
    }

    /// Builds a table from rows, checking key uniqueness and CRS.
    ///
    /// # Errors
    ///
    /// Returns the first [`PatchError::DuplicatePatchKey`] or
    /// [`PatchError::CrsMismatch`] encountered.
    pub fn from_rows(
        crs: Crs,
        columns: impl IntoIterator<Item = DerivedColumn>,
        rows: impl IntoIterator<Item = Row>,
    ) -> PatchResult<Self> {
        let mut table = Self::with_columns(crs, columns);
        for row in rows {
            table.push(row)?;
        }
        Ok(table)
    }

    /// CRS of every geometry in the table.
    #[must_use]
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Derived columns held by the table.
    #[must_use]
    pub fn columns(&self) -> &BTreeSet<DerivedColumn> {
        &self.columns
    }

    /// Returns `true` if the table holds `column`.
    #[must_use]
    pub fn has_column(&self, column: DerivedColumn) -> bool {
        self.columns.contains(&column)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Iterates over the rows in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Looks up a row by patch name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Row> {
        self.index.get(name).map(|&idx| &self.rows[idx])
    }

    /// Returns `true` if a row with this patch name exists.
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::DuplicatePatchKey`] if the name is already present and
    /// [`PatchError::CrsMismatch`] if the row geometry is not in the table CRS.
    pub fn push(&mut self, row: Row) -> PatchResult<()> {
        if self.index.contains_key(&row.name) {
            return Err(PatchError::DuplicatePatchKey { key: row.name });
        }
        if let Some(geometry) = &row.geometry
            && geometry.crs() != self.crs
        {
            return Err(PatchError::CrsMismatch {
                expected: self.crs,
                found: geometry.crs(),
            });
        }
        self.index.insert(row.name.clone(), self.rows.len());
        self.rows.push(row);
        Ok(())
    }

    /// A new table with the rows for which `keep` returns `true`, in the same order.
    #[must_use]
    pub fn filtered(&self, mut keep: impl FnMut(&Row) -> bool) -> Table {
        let mut table = Table::with_columns(self.crs, self.columns.iter().copied());
        for row in self.rows.iter().filter(|row| keep(row)) {
            table.index.insert(row.name.clone(), table.rows.len());
            table.rows.push(row.clone());
        }
        table
    }

    /// A copy of the table with rows ordered by patch name.
    #[must_use]
    pub fn sorted_by_name(&self) -> Table {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        let index = rows
            .iter()
            .enumerate()
            .map(|(idx, row)| (row.name.clone(), idx))
            .collect();
        Table {
            crs: self.crs,
            rows,
            index,
            columns: self.columns.clone(),
        }
    }

    /// Merges derived values into a copy of the table by patch name.
    ///
    /// Only values of `columns` are considered. A requested column the table
    /// already holds keeps its values unless `overwrite` is set. Rows without
    /// an update keep their current values; for a column new to the table they
    /// have none. Base columns are never touched.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::UnknownPatchKey`] if an update names a patch that is
    /// not in the table and [`PatchError::DuplicatePatchKey`] if two updates name
    /// the same patch. Nothing is merged in either case.
    pub fn join_derived(
        &self,
        updates: Vec<DerivedUpdate>,
        columns: &BTreeSet<DerivedColumn>,
        overwrite: bool,
    ) -> PatchResult<Table> {
        let mut by_row: HashMap<usize, Vec<DerivedValue>> = HashMap::with_capacity(updates.len());
        for (key, values) in updates {
            let Some(&idx) = self.index.get(&key) else {
                return Err(PatchError::UnknownPatchKey { key });
            };
            if by_row.insert(idx, values).is_some() {
                return Err(PatchError::DuplicatePatchKey { key });
            }
        }

        let writable: BTreeSet<DerivedColumn> = columns
            .iter()
            .copied()
            .filter(|column| overwrite || !self.has_column(*column))
            .collect();

        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                let mut row = row.clone();
                if let Some(values) = by_row.remove(&idx) {
                    for value in values {
                        if writable.contains(&value.column()) {
                            row = row.with_derived(value);
                        }
                    }
                }
                row
            })
            .collect();

        Ok(Table {
            crs: self.crs,
            rows,
            index: self.index.clone(),
            columns: self.columns.union(&writable).copied().collect(),
        })
    }

    /// Consumes the table and returns its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
