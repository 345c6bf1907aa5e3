//! Pure table helpers: sorting, selection and update routing.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use dormant_api_models::{Account, ParseEnumError};

/// Sortable account table columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortColumn {
    /// Bank-issued account number.
    AccountNumber,
    /// Holding bank.
    BankName,
    /// Account holder.
    CustomerName,
    /// Dormant balance.
    Balance,
    /// Reclaim workflow state.
    ReclaimStatus,
    /// Reclaim date.
    ReclaimDate,
    /// Clawback date.
    ClawbackDate,
}

impl SortColumn {
    /// Every column in display order.
    pub const ALL: [Self; 7] = [
        Self::AccountNumber,
        Self::BankName,
        Self::CustomerName,
        Self::Balance,
        Self::ReclaimStatus,
        Self::ReclaimDate,
        Self::ClawbackDate,
    ];

    /// Short name accepted on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AccountNumber => "account",
            Self::BankName => "bank",
            Self::CustomerName => "customer",
            Self::Balance => "balance",
            Self::ReclaimStatus => "status",
            Self::ReclaimDate => "reclaim-date",
            Self::ClawbackDate => "clawback-date",
        }
    }
}

impl Display for SortColumn {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for SortColumn {
    type Err = ParseEnumError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|column| column.as_str() == normalized)
            .ok_or_else(|| ParseEnumError::new("sort column", value))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl SortDirection {
    /// The other direction.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    const fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Self::Ascending => ordering,
            Self::Descending => ordering.reverse(),
        }
    }
}

/// Active sort column and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    /// Column being sorted.
    pub column: SortColumn,
    /// Direction applied to present values.
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            column: SortColumn::AccountNumber,
            direction: SortDirection::Ascending,
        }
    }
}

impl SortState {
    /// Header click: the same column flips direction, a new one starts ascending.
    #[must_use]
    pub fn toggle(self, column: SortColumn) -> Self {
        if self.column == column {
            Self {
                column,
                direction: self.direction.flipped(),
            }
        } else {
            Self {
                column,
                direction: SortDirection::Ascending,
            }
        }
    }
}

/// Sorted copy of `accounts`.
///
/// The sort is stable. Missing values always come last, whatever the
/// direction; text compares case-insensitively.
#[must_use]
pub fn sort_accounts(accounts: &[Account], state: SortState) -> Vec<Account> {
    let mut sorted = accounts.to_vec();
    sorted.sort_by(|left, right| compare(left, right, state));
    sorted
}

fn compare(left: &Account, right: &Account, state: SortState) -> Ordering {
    let direction = state.direction;
    match state.column {
        SortColumn::AccountNumber => direction.apply(text_cmp(
            &left.account_number,
            &right.account_number,
        )),
        SortColumn::BankName => direction.apply(text_cmp(&left.bank_name, &right.bank_name)),
        SortColumn::CustomerName => nulls_last(
            present_text(left.customer_name.as_deref()),
            present_text(right.customer_name.as_deref()),
            direction,
            |a, b| text_cmp(a, b),
        ),
        SortColumn::Balance => direction.apply(left.balance.cmp(&right.balance)),
        SortColumn::ReclaimStatus => nulls_last(
            left.reclaim_status,
            right.reclaim_status,
            direction,
            |a, b| a.as_str().cmp(b.as_str()),
        ),
        SortColumn::ReclaimDate => {
            nulls_last(left.reclaim_date, right.reclaim_date, direction, |a, b| {
                a.cmp(&b)
            })
        }
        SortColumn::ClawbackDate => {
            nulls_last(left.clawback_date, right.clawback_date, direction, |a, b| {
                a.cmp(&b)
            })
        }
    }
}

fn present_text(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.trim().is_empty())
}

fn text_cmp(left: &str, right: &str) -> Ordering {
    left.to_lowercase().cmp(&right.to_lowercase())
}

fn nulls_last<T>(
    left: Option<T>,
    right: Option<T>,
    direction: SortDirection,
    cmp: impl Fn(T, T) -> Ordering,
) -> Ordering {
    match (left, right) {
        (Some(a), Some(b)) => direction.apply(cmp(a, b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Checked rows of the account table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<i64>,
}

impl Selection {
    /// Empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check or uncheck one row.
    pub fn toggle(&mut self, id: i64) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    /// Header checkbox: select every visible row, or clear when all are
    /// already selected.
    pub fn select_all(&mut self, visible: &[Account]) {
        if self.is_all_selected(visible) {
            self.ids.clear();
        } else {
            self.ids = visible.iter().map(|account| account.id).collect();
        }
    }

    /// Uncheck everything.
    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids no longer present in `visible`.
    pub fn retain_visible(&mut self, visible: &[Account]) {
        let present: BTreeSet<i64> = visible.iter().map(|account| account.id).collect();
        self.ids.retain(|id| present.contains(id));
    }

    /// Whether every visible row is checked (false for an empty table).
    #[must_use]
    pub fn is_all_selected(&self, visible: &[Account]) -> bool {
        !visible.is_empty() && visible.iter().all(|account| self.ids.contains(&account.id))
    }

    /// Whether `id` is checked.
    #[must_use]
    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    /// Number of checked rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is checked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Checked ids in ascending order.
    #[must_use]
    pub fn ids(&self) -> Vec<i64> {
        self.ids.iter().copied().collect()
    }
}

impl FromIterator<i64> for Selection {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Where an update is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateTarget {
    /// Exactly one account.
    Single(i64),
    /// Two or more accounts through the bulk endpoint.
    Bulk(Vec<i64>),
}

impl UpdateTarget {
    /// Route by selection size; `None` when nothing is selected.
    #[must_use]
    pub fn from_selection(selection: &Selection) -> Option<Self> {
        match selection.ids().as_slice() {
            [] => None,
            [id] => Some(Self::Single(*id)),
            ids => Some(Self::Bulk(ids.to_vec())),
        }
    }

    /// Number of accounts targeted.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Bulk(ids) => ids.len(),
        }
    }

    /// Always false for a target built from a selection.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
