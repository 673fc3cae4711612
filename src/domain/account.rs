//! Chart of accounts
//!
//! Accounts form a forest: each account holds an optional reference to its
//! parent and children are derived by reverse lookup.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DomainError;

/// Account classification. Drives where an account lands on the statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Revenue,
        AccountType::Expense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }

    /// Asset and expense accounts increase on the debit side.
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "revenue" => Ok(AccountType::Revenue),
            "expense" => Ok(AccountType::Expense),
            "" => Err(DomainError::validation("account type is required")),
            other => Err(DomainError::InvalidAccountType(other.to_string())),
        }
    }
}

/// A ledger account with its running balance.
///
/// `balance` follows the uniform convention: debits add, credits subtract,
/// whatever the account type. Only the posting path writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub balance: Decimal,
    pub parent_id: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// New account with a zero balance.
    pub fn open(
        code: String,
        name: String,
        account_type: AccountType,
        parent_id: Option<Uuid>,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            code,
            name,
            account_type,
            balance: Decimal::ZERO,
            parent_id,
            description,
            created_at: now,
            updated_at: now,
        }
    }

    /// Case-insensitive substring match over name and code.
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        self.name.to_lowercase().contains(&keyword) || self.code.to_lowercase().contains(&keyword)
    }

    /// Cash-equivalent heuristic: an asset named or coded like cash or bank.
    pub fn is_cash_like(&self) -> bool {
        self.account_type == AccountType::Asset
            && (self.matches_keyword("cash") || self.matches_keyword("bank"))
    }
}

/// Account with its derived children, as returned by the tree view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountNode {
    #[serde(flatten)]
    pub account: Account,
    pub children: Vec<AccountNode>,
}

/// Assemble the chart of accounts into a forest.
///
/// One pass builds an id index and the parent-to-children adjacency, a
/// second materializes the owned nodes. Accounts whose parent is unknown are
/// treated as roots. Siblings are ordered by code.
pub fn build_account_tree(mut accounts: Vec<Account>) -> Vec<AccountNode> {
    accounts.sort_by(|a, b| a.code.cmp(&b.code));

    let index: HashMap<Uuid, usize> = accounts
        .iter()
        .enumerate()
        .map(|(pos, account)| (account.id, pos))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); accounts.len()];
    let mut roots = Vec::new();
    for (pos, account) in accounts.iter().enumerate() {
        match account.parent_id.and_then(|parent| index.get(&parent)) {
            Some(&parent_pos) if parent_pos != pos => children[parent_pos].push(pos),
            _ => roots.push(pos),
        }
    }

    let mut visited = vec![false; accounts.len()];
    let mut forest: Vec<AccountNode> = roots
        .into_iter()
        .map(|pos| materialize(pos, &accounts, &children, &mut visited))
        .collect();

    // Members of a parent loop are unreachable from any root; surface them
    // as roots rather than dropping them.
    for pos in 0..accounts.len() {
        if !visited[pos] {
            forest.push(materialize(pos, &accounts, &children, &mut visited));
        }
    }

    forest
}

fn materialize(
    pos: usize,
    accounts: &[Account],
    children: &[Vec<usize>],
    visited: &mut [bool],
) -> AccountNode {
    visited[pos] = true;
    let mut nodes = Vec::with_capacity(children[pos].len());
    for &child in &children[pos] {
        if !visited[child] {
            nodes.push(materialize(child, accounts, children, visited));
        }
    }
    AccountNode {
        account: accounts[pos].clone(),
        children: nodes,
    }
}

/// Reject parent assignments that would make `account_id` its own ancestor.
///
/// `parent_of` maps an account id to its current parent. Callers run this
/// against state they hold locked so that concurrent moves cannot close a loop.
pub fn ensure_acyclic_parent<F>(
    account_id: Uuid,
    parent_id: Uuid,
    parent_of: F,
) -> Result<(), DomainError>
where
    F: Fn(Uuid) -> Option<Uuid>,
{
    if account_id == parent_id {
        return Err(DomainError::SelfParent(account_id));
    }

    let mut seen = HashSet::new();
    let mut cursor = Some(parent_id);
    while let Some(current) = cursor {
        if current == account_id {
            return Err(DomainError::ParentCycle {
                account_id,
                parent_id,
            });
        }
        if !seen.insert(current) {
            // Pre-existing loop not involving this account
            break;
        }
        cursor = parent_of(current);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(code: &str, parent_id: Option<Uuid>) -> Account {
        Account::open(
            code.to_string(),
            format!("Account {}", code),
            AccountType::Asset,
            parent_id,
            None,
        )
    }

    fn count_nodes(nodes: &[AccountNode]) -> usize {
        nodes.iter().map(|n| 1 + count_nodes(&n.children)).sum()
    }

    #[test]
    fn test_account_type_parse() {
        assert_eq!("Asset".parse::<AccountType>().unwrap(), AccountType::Asset);
        assert_eq!(" revenue ".parse::<AccountType>().unwrap(), AccountType::Revenue);
        assert!(matches!(
            "income".parse::<AccountType>(),
            Err(DomainError::InvalidAccountType(_))
        ));
        assert!(matches!("".parse::<AccountType>(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_account_type_serde_lowercase() {
        let json = serde_json::to_string(&AccountType::Liability).unwrap();
        assert_eq!(json, "\"liability\"");
    }

    #[test]
    fn test_tree_three_levels() {
        let root = account("1", None);
        let child = account("2", Some(root.id));
        let grandchild = account("3", Some(child.id));

        let forest = build_account_tree(vec![grandchild.clone(), root.clone(), child.clone()]);

        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].account.id, root.id);
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].account.id, child.id);
        assert_eq!(forest[0].children[0].children.len(), 1);
        assert_eq!(forest[0].children[0].children[0].account.id, grandchild.id);
        assert_eq!(count_nodes(&forest), 3);
    }

    #[test]
    fn test_tree_orphan_becomes_root_and_siblings_sorted() {
        let root = account("1000", None);
        let b = account("1200", Some(root.id));
        let a = account("1100", Some(root.id));
        let orphan = account("9000", Some(Uuid::new_v4()));

        let forest = build_account_tree(vec![b, orphan.clone(), a, root]);

        assert_eq!(forest.len(), 2);
        let codes: Vec<_> = forest[0].children.iter().map(|n| n.account.code.as_str()).collect();
        assert_eq!(codes, vec!["1100", "1200"]);
        assert_eq!(forest[1].account.id, orphan.id);
    }

    #[test]
    fn test_tree_loop_members_not_lost() {
        let mut a = account("A", None);
        let mut b = account("B", None);
        a.parent_id = Some(b.id);
        b.parent_id = Some(a.id);

        let forest = build_account_tree(vec![a, b]);
        assert_eq!(count_nodes(&forest), 2);
    }

    #[test]
    fn test_cycle_detection() {
        let a = account("A", None);
        let b = account("B", Some(a.id));
        let c = account("C", Some(b.id));
        let parents: HashMap<Uuid, Option<Uuid>> =
            [&a, &b, &c].iter().map(|x| (x.id, x.parent_id)).collect();
        let parent_of = |id: Uuid| parents.get(&id).copied().flatten();

        assert!(matches!(
            ensure_acyclic_parent(a.id, a.id, parent_of),
            Err(DomainError::SelfParent(_))
        ));
        assert!(matches!(
            ensure_acyclic_parent(a.id, c.id, parent_of),
            Err(DomainError::ParentCycle { .. })
        ));
        assert!(ensure_acyclic_parent(c.id, a.id, parent_of).is_ok());
    }

    #[test]
    fn test_cash_heuristic() {
        let mut bank = account("1010", None);
        bank.name = "Main BANK Account".to_string();
        assert!(bank.is_cash_like());

        let mut coded = account("CASH-01", None);
        coded.name = "Till".to_string();
        assert!(coded.is_cash_like());

        let mut liability = account("2000", None);
        liability.name = "Bank Loan".to_string();
        liability.account_type = AccountType::Liability;
        assert!(!liability.is_cash_like());
    }
}
