//! Roles and the permissions they grant.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FinanceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewReports,
    ManageIncomes,
    ManagePayments,
    ManageCreditCards,
    ManageFinancings,
    ManageInvestments,
    ManageUsers,
}

impl Permission {
    pub const ALL: [Permission; 7] = [
        Permission::ViewReports,
        Permission::ManageIncomes,
        Permission::ManagePayments,
        Permission::ManageCreditCards,
        Permission::ManageFinancings,
        Permission::ManageInvestments,
        Permission::ManageUsers,
    ];
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::ViewReports => "view_reports",
            Permission::ManageIncomes => "manage_incomes",
            Permission::ManagePayments => "manage_payments",
            Permission::ManageCreditCards => "manage_credit_cards",
            Permission::ManageFinancings => "manage_financings",
            Permission::ManageInvestments => "manage_investments",
            Permission::ManageUsers => "manage_users",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub permissions: BTreeSet<Permission>,
}

impl Role {
    pub fn new(name: impl Into<String>, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            name: name.into(),
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn admin() -> Self {
        Self::new("admin", Permission::ALL)
    }

    /// Manages their own finances but not other users.
    pub fn member() -> Self {
        Self::new(
            "member",
            Permission::ALL
                .into_iter()
                .filter(|permission| *permission != Permission::ManageUsers),
        )
    }

    pub fn viewer() -> Self {
        Self::new("viewer", [Permission::ViewReports])
    }

    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    pub fn require(&self, permission: Permission) -> Result<()> {
        if self.grants(permission) {
            Ok(())
        } else {
            tracing::warn!(role = %self.name, %permission, "permission denied");
            Err(FinanceError::Forbidden {
                role: self.name.clone(),
                permission,
            })
        }
    }
}
