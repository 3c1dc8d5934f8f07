use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use log::debug;

use crate::{
    database::Database,
    error::MinnowError,
    execution::op::Op,
    optimizer::table_stats::TableStats,
};

/// One join predicate of the query, `left_table.left_field op
/// right_table.right_field`, identified by table name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalJoinNode {
    pub left_table: String,
    pub right_table: String,
    pub left_field: usize,
    pub right_field: usize,
    pub op: Op,
}

impl LogicalJoinNode {
    pub fn new(
        left_table: &str,
        left_field: usize,
        op: Op,
        right_table: &str,
        right_field: usize,
    ) -> Self {
        Self {
            left_table: left_table.to_string(),
            right_table: right_table.to_string(),
            left_field,
            right_field,
            op,
        }
    }
}

/// The memoised best result for one subset of joins: its cost, output
/// cardinality, and the left-deep order that achieves them.
#[derive(Debug, Clone)]
pub struct CostCard {
    pub cost: f64,
    pub card: usize,
    pub plan: Vec<LogicalJoinNode>,
}

/// Selinger-style left-deep join ordering: dynamic programming over
/// subsets of the join set, smallest first, keeping the cheapest order
/// per subset.
pub struct JoinOptimizer;

impl JoinOptimizer {
    /// Reorder `joins` into the cheapest left-deep sequence under the
    /// simple cost model: a join costs its outer side plus one inner scan
    /// per outer row.
    pub fn order_joins(
        stats: &HashMap<String, TableStats>,
        filter_selectivities: &HashMap<String, f64>,
        joins: &[LogicalJoinNode],
    ) -> Result<Vec<LogicalJoinNode>, MinnowError> {
        let n = joins.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        if n > 62 {
            return Err(MinnowError::invalid_arg(
                "too many joins to enumerate subsets",
            ));
        }

        let scan_cost = |table: &str| -> Result<f64, MinnowError> {
            stats
                .get(table)
                .map(|s| s.estimate_scan_cost())
                .ok_or_else(|| {
                    MinnowError::invalid_arg(&format!("no statistics for table {}", table))
                })
        };
        let base_card = |table: &str| -> Result<usize, MinnowError> {
            let selectivity = filter_selectivities.get(table).copied().unwrap_or(1.0);
            stats
                .get(table)
                .map(|s| s.estimate_table_cardinality(selectivity))
                .ok_or_else(|| {
                    MinnowError::invalid_arg(&format!("no statistics for table {}", table))
                })
        };

        let mut best: HashMap<u64, CostCard> = HashMap::new();

        for size in 1..=n {
            for subset in (0..n).combinations(size) {
                let mask: u64 = subset.iter().fold(0u64, |m, j| m | (1u64 << *j));

                let mut winner: Option<CostCard> = None;
                for &last in &subset {
                    let join = &joins[last];
                    let candidate = if size == 1 {
                        // a lone join: scan the outer, probe with the inner
                        let outer_card = base_card(&join.left_table)?;
                        let inner_card = base_card(&join.right_table)?;
                        let cost = scan_cost(&join.left_table)?
                            + outer_card as f64 * scan_cost(&join.right_table)?;
                        let card = Self::estimate_join_cardinality(join, outer_card, inner_card);
                        CostCard {
                            cost,
                            card,
                            plan: vec![join.clone()],
                        }
                    } else {
                        let rest_mask = mask & !(1u64 << last);
                        let rest = best.get(&rest_mask).ok_or_else(|| {
                            MinnowError::db("join enumeration lost a subplan")
                        })?;

                        let rest_tables = Self::tables_of(&rest.plan);
                        let left_known = rest_tables.contains(join.left_table.as_str());
                        let right_known = rest_tables.contains(join.right_table.as_str());

                        if left_known && right_known {
                            // both sides are already in the subplan: the
                            // predicate only filters what is there
                            CostCard {
                                cost: rest.cost + rest.card as f64,
                                card: rest.card,
                                plan: Self::extend(&rest.plan, join),
                            }
                        } else {
                            let new_table = if left_known {
                                &join.right_table
                            } else {
                                &join.left_table
                            };
                            let inner_card = base_card(new_table)?;
                            let cost =
                                rest.cost + rest.card as f64 * scan_cost(new_table)?;
                            let card =
                                Self::estimate_join_cardinality(join, rest.card, inner_card);
                            CostCard {
                                cost,
                                card,
                                plan: Self::extend(&rest.plan, join),
                            }
                        }
                    };

                    let better = match &winner {
                        Some(w) => candidate.cost < w.cost,
                        None => true,
                    };
                    if better {
                        winner = Some(candidate);
                    }
                }

                best.insert(mask, winner.unwrap());
            }
        }

        let full_mask = (1u64 << n) - 1;
        let result = best.remove(&full_mask).unwrap();
        debug!(
            "chosen join order, cost {:.1}, cardinality {}: {:?}",
            result.cost, result.card, result.plan
        );
        Ok(result.plan)
    }

    fn extend(plan: &[LogicalJoinNode], join: &LogicalJoinNode) -> Vec<LogicalJoinNode> {
        let mut extended = plan.to_vec();
        extended.push(join.clone());
        extended
    }

    fn tables_of(plan: &[LogicalJoinNode]) -> HashSet<&str> {
        let mut tables = HashSet::new();
        for join in plan {
            tables.insert(join.left_table.as_str());
            tables.insert(join.right_table.as_str());
        }
        tables
    }

    /// Output cardinality of one join. An equality join on a key column
    /// keeps at most the smaller side; anything else is estimated as the
    /// cross product.
    pub fn estimate_join_cardinality(
        join: &LogicalJoinNode,
        left_card: usize,
        right_card: usize,
    ) -> usize {
        if join.op == Op::Equals {
            let left_is_key = Self::is_key_column(&join.left_table, join.left_field);
            let right_is_key = Self::is_key_column(&join.right_table, join.right_field);
            if left_is_key || right_is_key {
                return left_card.min(right_card).max(1);
            }
        }

        left_card.saturating_mul(right_card).max(1)
    }

    fn is_key_column(table_name: &str, field: usize) -> bool {
        let catalog = Database::catalog();
        match catalog.get_table_id(table_name) {
            Some(id) => match catalog.get_table(&id) {
                Ok(table) => table.is_key_field(field),
                Err(_) => false,
            },
            None => false,
        }
    }
}
