use std::collections::HashMap;

use log::debug;

use crate::{
    database::Database,
    error::MinnowError,
    execution::op::Op,
    optimizer::histogram::IntHistogram,
    storage::field::{Cell, Type},
    transaction::Transaction,
};

/// Histogram bins per column.
pub const NUM_HIST_BINS: usize = 100;

/// Per-table statistics: cardinality, page count and one histogram per
/// integer column, gathered by a single full scan at startup.
pub struct TableStats {
    total_tuples: usize,
    num_pages: usize,
    io_cost_per_page: f64,
    histograms: HashMap<usize, IntHistogram>,
}

impl TableStats {
    pub fn new(table_id: u32, io_cost_per_page: f64) -> Result<Self, MinnowError> {
        let table = Database::catalog().get_table(&table_id)?;
        let schema = table.get_schema();

        let int_fields: Vec<usize> = schema
            .get_fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| f.field_type == Type::Int64)
            .map(|(i, _)| i)
            .collect();

        // pass over the table once, keeping the integer columns around to
        // build their histograms afterwards; a lock give-up mid-scan rolls
        // the scanning transaction back and propagates
        let tx = Transaction::new();
        let mut columns: HashMap<usize, Vec<i64>> =
            int_fields.iter().map(|i| (*i, Vec::new())).collect();
        let mut total_tuples = 0;

        let mut scan = table.iter_tuples(&tx);
        loop {
            let tuple = match scan.next() {
                Some(Ok(tuple)) => tuple,
                Some(Err(e)) => {
                    drop(scan);
                    tx.abort()?;
                    return Err(e);
                }
                None => break,
            };

            total_tuples += 1;
            for field in &int_fields {
                if let Cell::Int64(v) = tuple.get_cell(*field) {
                    columns.get_mut(field).unwrap().push(v);
                }
            }
        }
        drop(scan);
        tx.commit()?;

        let mut histograms = HashMap::new();
        for (field, values) in columns {
            if values.is_empty() {
                continue;
            }
            let min = *values.iter().min().unwrap();
            let max = *values.iter().max().unwrap();
            let mut histogram = IntHistogram::new(NUM_HIST_BINS, min, max);
            for v in &values {
                histogram.add_value(*v);
            }
            histograms.insert(field, histogram);
        }

        let num_pages = table.num_pages()?;
        debug!(
            "stats for table {}: {} tuples over {} pages",
            table_id, total_tuples, num_pages
        );

        Ok(Self {
            total_tuples,
            num_pages,
            io_cost_per_page,
            histograms,
        })
    }

    /// Build statistics for every registered table, keyed by table name.
    pub fn for_all_tables(io_cost_per_page: f64) -> HashMap<String, TableStats> {
        let tables: Vec<(u32, String)> = {
            let catalog = Database::catalog();
            catalog
                .table_ids()
                .into_iter()
                .filter_map(|id| catalog.get_table_name(&id).map(|name| (id, name)))
                .collect()
        };

        let mut stats = HashMap::new();
        for (id, name) in tables {
            match TableStats::new(id, io_cost_per_page) {
                Ok(table_stats) => {
                    stats.insert(name, table_stats);
                }
                Err(e) => debug!("skipping stats for table {}: {}", id, e),
            }
        }
        stats
    }

    /// Cost of one full scan: every page is one I/O.
    pub fn estimate_scan_cost(&self) -> f64 {
        self.num_pages as f64 * self.io_cost_per_page
    }

    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.total_tuples as f64 * selectivity) as usize
    }

    pub fn total_tuples(&self) -> usize {
        self.total_tuples
    }

    /// Selectivity of `field op constant` against the gathered
    /// histograms. Columns without a histogram fall back to a flat guess.
    pub fn estimate_selectivity(&self, field: usize, op: Op, constant: &Cell) -> f64 {
        match (self.histograms.get(&field), constant) {
            (Some(histogram), Cell::Int64(v)) => histogram.estimate_selectivity(op, *v),
            _ => 0.5,
        }
    }

    pub fn avg_selectivity(&self, field: usize) -> f64 {
        match self.histograms.get(&field) {
            Some(histogram) => histogram.avg_selectivity(),
            None => 0.5,
        }
    }
}
