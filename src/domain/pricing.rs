use serde::{Deserialize, Serialize};

use super::Cents;

/// Margin on a single tractor sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleProfit {
    /// Sale price minus what we paid for the tractor
    pub gross: Cents,
    /// Gross minus the value credited for a trade-in, if any
    pub net: Cents,
}

pub fn sale_profit(sale_price: Cents, purchase_price: Cents, trade_in_cost: Option<Cents>) -> SaleProfit {
    let gross = sale_price - purchase_price;
    SaleProfit {
        gross,
        net: gross - trade_in_cost.unwrap_or(0),
    }
}

/// Period totals derived from the ledger and the expense book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitLoss {
    pub total_sales: Cents,
    pub total_purchases: Cents,
    pub total_expenses: Cents,
    pub gross_profit: Cents,
    pub net_profit: Cents,
}

impl ProfitLoss {
    pub fn from_totals(total_sales: Cents, total_purchases: Cents, total_expenses: Cents) -> Self {
        let gross_profit = total_sales - total_purchases;
        Self {
            total_sales,
            total_purchases,
            total_expenses,
            gross_profit,
            net_profit: gross_profit - total_expenses,
        }
    }
}
