use std::cmp;

use log::debug;

use crate::{
    buffer_pool::BufferPool,
    concurrent_status::{ConcurrentStatus, Permission},
    error::MinnowError,
    storage::{
        field::Cell,
        page::Page,
        page_id::{PageCategory, PageId},
        tuple::WrappedTuple,
    },
    transaction::Transaction,
    types::{MinnowResult, Pod},
    utils::HandyRwLock,
};

use super::{
    page::{BTreeInternalPage, BTreeLeafPage, BTreePage, Entry},
    table::BTreeTable,
};

/// Deletion, with the rebalancing it may set off: a leaf or internal page
/// that falls below half occupancy steals from a sibling when the sibling
/// has tuples to spare, and merges with it otherwise. Merges propagate
/// upwards and may collapse the root.
impl BTreeTable {
    pub fn delete_tuple(&self, tx: &Transaction, tuple: &WrappedTuple) -> MinnowResult {
        // taking the root pointer first puts deletes on the same lock
        // order as inserts
        let _root_ptr = self.get_root_ptr_page(tx)?;

        let pid = tuple.get_pid();
        if pid.category != PageCategory::Leaf || pid.table_id != self.get_id() {
            return Err(MinnowError::invalid_arg(&format!(
                "record id {} does not reference this table",
                pid
            )));
        }

        let leaf_rc = BufferPool::get_leaf_page(tx, Permission::ReadWrite, &pid)?;

        // hold the leaf
        {
            let mut leaf = leaf_rc.wl();
            leaf.delete_tuple(tuple.get_slot_index())?;
        }
        // release the leaf

        ConcurrentStatus::set_dirty(tx, &pid);

        if leaf_rc.rl().stable() {
            return Ok(());
        }
        self.handle_erratic_leaf_page(tx, leaf_rc)
    }

    /// A leaf fell below half full: rebalance it against a same-parent
    /// neighbour (the left one when both qualify).
    fn handle_erratic_leaf_page(
        &self,
        tx: &Transaction,
        page_rc: Pod<BTreeLeafPage>,
    ) -> MinnowResult {
        if page_rc.rl().get_parent_pid().category == PageCategory::RootPointer {
            // the root leaf may shrink to nothing
            return Ok(());
        }

        let parent_pid = page_rc.rl().get_parent_pid();
        let left_pid = page_rc.rl().get_left_pid();
        let right_pid = page_rc.rl().get_right_pid();

        if let Some(left_pid) = left_pid {
            let left_rc = BufferPool::get_leaf_page(tx, Permission::ReadWrite, &left_pid)?;
            if left_rc.rl().get_parent_pid() == parent_pid {
                return self.balancing_two_leaf_pages(tx, left_rc, page_rc);
            }
        }

        if let Some(right_pid) = right_pid {
            let right_rc = BufferPool::get_leaf_page(tx, Permission::ReadWrite, &right_pid)?;
            if right_rc.rl().get_parent_pid() == parent_pid {
                return self.balancing_two_leaf_pages(tx, page_rc, right_rc);
            }
        }

        Err(MinnowError::db(&format!(
            "leaf {} has no same-parent sibling to rebalance with",
            page_rc.rl().get_pid()
        )))
    }

    /// Merge two adjacent leaves when their tuples fit in one page,
    /// otherwise move tuples until both sides are balanced and refresh
    /// the separator key in the parent.
    fn balancing_two_leaf_pages(
        &self,
        tx: &Transaction,
        left_rc: Pod<BTreeLeafPage>,
        right_rc: Pod<BTreeLeafPage>,
    ) -> MinnowResult {
        let parent_pid = left_rc.rl().get_parent_pid();
        let parent_rc = BufferPool::get_internal_page(tx, Permission::ReadWrite, &parent_pid)?;

        let mut entry = parent_rc
            .rl()
            .get_entry_by_children(&left_rc.rl().get_pid(), &right_rc.rl().get_pid())
            .ok_or_else(|| {
                MinnowError::db(&format!(
                    "parent {} has no entry for the sibling pair",
                    parent_pid
                ))
            })?;

        let left_tuples = left_rc.rl().tuples_count();
        let right_tuples = right_rc.rl().tuples_count();

        if left_tuples + right_tuples <= left_rc.rl().get_slots_count() {
            return self.merge_leaf_pages(tx, left_rc, right_rc, parent_rc, &entry);
        }

        let move_count =
            (left_tuples + right_tuples) / 2 - cmp::min(left_tuples, right_tuples);
        if move_count == 0 {
            return Ok(());
        }

        let new_key: Cell;

        // hold the left and right page
        {
            let mut left = left_rc.wl();
            let mut right = right_rc.wl();

            if left_tuples < right_tuples {
                // steal the smallest tuples of the right page
                let moved: Vec<WrappedTuple> = right.iter().take(move_count).collect();
                for tuple in &moved {
                    left.insert_tuple(tuple)?;
                    right.delete_tuple(tuple.get_slot_index())?;
                }
            } else {
                // steal the largest tuples of the left page
                let moved: Vec<WrappedTuple> = left.iter().rev().take(move_count).collect();
                for tuple in &moved {
                    right.insert_tuple(tuple)?;
                    left.delete_tuple(tuple.get_slot_index())?;
                }
            }

            // the separator becomes the first key of the right-hand page
            new_key = right
                .iter()
                .next()
                .ok_or_else(|| MinnowError::db("redistribution emptied a page"))?
                .get_cell(self.key_field);

            ConcurrentStatus::set_dirty(tx, &left.get_pid());
            ConcurrentStatus::set_dirty(tx, &right.get_pid());
        }
        // release the left and right page

        entry.set_key(new_key);
        parent_rc.wl().update_entry(&entry);
        ConcurrentStatus::set_dirty(tx, &parent_pid);

        Ok(())
    }

    /// All of the right page moves into the left; the right page leaves
    /// the sibling chain and goes back to the file for reuse, and the
    /// separating entry disappears from the parent.
    fn merge_leaf_pages(
        &self,
        tx: &Transaction,
        left_rc: Pod<BTreeLeafPage>,
        right_rc: Pod<BTreeLeafPage>,
        parent_rc: Pod<BTreeInternalPage>,
        entry: &Entry,
    ) -> MinnowResult {
        let right_pid;

        // hold the left and right page
        {
            let mut left = left_rc.wl();
            let mut right = right_rc.wl();

            debug!("leaf {} merges into {}", right.get_pid(), left.get_pid());

            let moved: Vec<WrappedTuple> = right.iter().collect();
            for tuple in &moved {
                left.insert_tuple(tuple)?;
                right.delete_tuple(tuple.get_slot_index())?;
            }

            left.set_right_pid(right.get_right_pid());
            if let Some(after_right_pid) = right.get_right_pid() {
                let after_right_rc =
                    BufferPool::get_leaf_page(tx, Permission::ReadWrite, &after_right_pid)?;
                after_right_rc.wl().set_left_pid(Some(left.get_pid()));
                ConcurrentStatus::set_dirty(tx, &after_right_pid);
            }

            right_pid = right.get_pid();
            ConcurrentStatus::set_dirty(tx, &left.get_pid());
        }
        // release the left and right page

        self.set_empty_page(tx, &right_pid)?;
        self.delete_parent_entry(tx, &left_rc, &parent_rc, entry)
    }

    /// An internal page fell below half full: find its same-parent
    /// neighbours through the parent's entries and rebalance.
    fn handle_erratic_internal_page(
        &self,
        tx: &Transaction,
        page_rc: Pod<BTreeInternalPage>,
    ) -> MinnowResult {
        if page_rc.rl().get_parent_pid().category == PageCategory::RootPointer {
            return Ok(());
        }

        let parent_pid = page_rc.rl().get_parent_pid();
        let my_pid = page_rc.rl().get_pid();
        let parent_rc = BufferPool::get_internal_page(tx, Permission::ReadWrite, &parent_pid)?;

        let (left_pid, right_pid) = {
            let parent = parent_rc.rl();
            let mut left: Option<PageId> = None;
            let mut right: Option<PageId> = None;
            for e in parent.iter() {
                if e.get_right_child() == my_pid {
                    left = Some(e.get_left_child());
                }
                if e.get_left_child() == my_pid {
                    right = Some(e.get_right_child());
                }
            }
            (left, right)
        };

        if let Some(left_pid) = left_pid {
            let left_rc = BufferPool::get_internal_page(tx, Permission::ReadWrite, &left_pid)?;
            return self.balancing_two_internal_pages(tx, left_rc, page_rc);
        }
        if let Some(right_pid) = right_pid {
            let right_rc = BufferPool::get_internal_page(tx, Permission::ReadWrite, &right_pid)?;
            return self.balancing_two_internal_pages(tx, page_rc, right_rc);
        }

        Err(MinnowError::db(&format!(
            "internal page {} has no sibling under parent {}",
            my_pid, parent_pid
        )))
    }

    /// Merge two adjacent internal pages when everything fits in one,
    /// otherwise rotate entries through the parent: the separator comes
    /// down into the poorer page and the donor's adjacent key goes up to
    /// replace it. Moved subtrees are re-parented along the way.
    fn balancing_two_internal_pages(
        &self,
        tx: &Transaction,
        left_rc: Pod<BTreeInternalPage>,
        right_rc: Pod<BTreeInternalPage>,
    ) -> MinnowResult {
        let parent_pid = left_rc.rl().get_parent_pid();
        let parent_rc = BufferPool::get_internal_page(tx, Permission::ReadWrite, &parent_pid)?;

        let mut entry = parent_rc
            .rl()
            .get_entry_by_children(&left_rc.rl().get_pid(), &right_rc.rl().get_pid())
            .ok_or_else(|| {
                MinnowError::db(&format!(
                    "parent {} has no entry for the sibling pair",
                    parent_pid
                ))
            })?;

        let left_children = left_rc.rl().children_count();
        let right_children = right_rc.rl().children_count();

        if left_children + right_children <= left_rc.rl().get_children_capacity() {
            return self.merge_internal_pages(tx, left_rc, right_rc, parent_rc, &entry);
        }

        let move_count = (left_children + right_children) / 2
            - cmp::min(left_children, right_children);
        if move_count == 0 {
            return Ok(());
        }

        let mut middle_key = entry.get_key();

        // hold the left and right page
        {
            let mut left = left_rc.wl();
            let mut right = right_rc.wl();

            if left_children < right_children {
                // rotate entries leftwards out of the right page
                let moved: Vec<Entry> = right.iter().take(move_count).collect();
                let mut edge_child = left.get_last_child_pid();

                for e in &moved {
                    let pulled_down = Entry::new(
                        middle_key.clone(),
                        &edge_child,
                        &e.get_left_child(),
                    );
                    left.insert_entry(&pulled_down)?;
                    self.set_parent(tx, &e.get_left_child(), &left.get_pid())?;

                    middle_key = e.get_key();
                    edge_child = e.get_left_child();
                    right.delete_key_and_left_child(e.get_record_id());
                }
            } else {
                // rotate entries rightwards out of the left page
                let moved: Vec<Entry> = left.iter().rev().take(move_count).collect();
                let mut edge_child = right.get_first_child_pid();

                for e in &moved {
                    let pulled_down = Entry::new(
                        middle_key.clone(),
                        &e.get_right_child(),
                        &edge_child,
                    );
                    right.insert_entry(&pulled_down)?;
                    self.set_parent(tx, &e.get_right_child(), &right.get_pid())?;

                    middle_key = e.get_key();
                    edge_child = e.get_right_child();
                    left.delete_key_and_right_child(e.get_record_id());
                }
            }

            ConcurrentStatus::set_dirty(tx, &left.get_pid());
            ConcurrentStatus::set_dirty(tx, &right.get_pid());
        }
        // release the left and right page

        entry.set_key(middle_key);
        parent_rc.wl().update_entry(&entry);
        ConcurrentStatus::set_dirty(tx, &parent_pid);

        Ok(())
    }

    /// The separator comes down for good as the entry between the left
    /// page's last child and the right page's first child; the right page
    /// empties into the left and is reclaimed.
    fn merge_internal_pages(
        &self,
        tx: &Transaction,
        left_rc: Pod<BTreeInternalPage>,
        right_rc: Pod<BTreeInternalPage>,
        parent_rc: Pod<BTreeInternalPage>,
        parent_entry: &Entry,
    ) -> MinnowResult {
        let right_pid;

        // hold the left and right page
        {
            let mut left = left_rc.wl();
            let mut right = right_rc.wl();

            debug!(
                "internal page {} merges into {}",
                right.get_pid(),
                left.get_pid()
            );

            let pulled_down = Entry::new(
                parent_entry.get_key(),
                &left.get_last_child_pid(),
                &right.get_first_child_pid(),
            );
            self.set_parent(tx, &right.get_first_child_pid(), &left.get_pid())?;
            left.insert_entry(&pulled_down)?;

            let moved: Vec<Entry> = right.iter().collect();
            for e in &moved {
                left.insert_entry(e)?;
                self.set_parent(tx, &e.get_right_child(), &left.get_pid())?;
                right.delete_key_and_right_child(e.get_record_id());
            }

            right_pid = right.get_pid();
            ConcurrentStatus::set_dirty(tx, &left.get_pid());
        }
        // release the left and right page

        self.set_empty_page(tx, &right_pid)?;
        self.delete_parent_entry(tx, &left_rc, &parent_rc, parent_entry)
    }

    /// Remove an entry (key and right child) from a parent after a merge.
    /// An emptied root hands the tree over to its surviving child; a
    /// non-root parent below half occupancy rebalances in turn.
    fn delete_parent_entry<PAGE: BTreePage>(
        &self,
        tx: &Transaction,
        left_rc: &Pod<PAGE>,
        parent_rc: &Pod<BTreeInternalPage>,
        entry: &Entry,
    ) -> MinnowResult {
        let mut collapsed_root: Option<PageId> = None;

        // hold the parent and the surviving child
        {
            let mut parent = parent_rc.wl();
            let mut left = left_rc.wl();

            parent.delete_key_and_right_child(entry.get_record_id());
            ConcurrentStatus::set_dirty(tx, &parent.get_pid());

            if parent.entries_count() == 0
                && parent.get_parent_pid().category == PageCategory::RootPointer
            {
                // root collapse: the surviving child is the new root
                let root_ptr_rc = self.get_root_ptr_page(tx)?;
                {
                    let mut root_ptr = root_ptr_rc.wl();
                    left.set_parent_pid(&root_ptr.get_pid());
                    root_ptr.set_root_pid(&left.get_pid());
                }
                ConcurrentStatus::set_dirty(tx, &self.root_ptr_pid());
                ConcurrentStatus::set_dirty(tx, &left.get_pid());

                collapsed_root = Some(parent.get_pid());
            } else if parent.stable() {
                return Ok(());
            }
        }
        // release the parent and the surviving child

        if let Some(old_root_pid) = collapsed_root {
            debug!("root {} collapses", old_root_pid);
            return self.set_empty_page(tx, &old_root_pid);
        }

        self.handle_erratic_internal_page(tx, parent_rc.clone())
    }
}
