use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use tracing::debug;

use crate::error::SettlementError;
use crate::orders::models::LineItem;
use crate::settlement::models::{PayoutAccount, SettlementInstruction, VendorId};

/// Round a monetary value to 2 decimal places with half-up rounding.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Split an order's item total between the marketplace admin account and the
/// vendor accounts contributing to the order.
///
/// The admin takes `admin_percentage` of the item total; the remainder is
/// distributed across vendors proportionally to their contribution, with the
/// last vendor (in first-seen item order) absorbing the rounding remainder so
/// the instruction amounts always sum exactly to the item total.
///
/// Pure function: no I/O, no clock, no shared state.
pub fn compute_settlement(
    items: &[LineItem],
    admin_account: &PayoutAccount,
    admin_percentage: Decimal,
    vendor_accounts: &HashMap<VendorId, PayoutAccount>,
) -> Result<Vec<SettlementInstruction>, SettlementError> {
    // Admin configuration is checked before any vendor work is attempted.
    if !admin_account.is_complete() {
        return Err(SettlementError::MissingAdminAccount);
    }

    if admin_percentage < Decimal::ZERO || admin_percentage > dec!(100) {
        return Err(SettlementError::InvalidPercentage(
            admin_percentage.to_string(),
        ));
    }

    let mut item_total = Decimal::ZERO;
    // Insertion-ordered vendor totals; HashMap iteration order is not stable
    // and the remainder rule depends on a deterministic last vendor.
    let mut vendor_totals: Vec<(VendorId, Decimal)> = Vec::new();

    for item in items {
        // Round each extended price before accumulating so float-style
        // compounding error cannot creep into the total.
        let extended = round_money(item.extended_price());
        item_total += extended;

        let Some(vendor_id) = item.vendor else {
            // Shipping-as-line-item rows carry no vendor; they count toward
            // the item total and flow into the vendor pool.
            continue;
        };

        let complete = vendor_accounts
            .get(&vendor_id)
            .map(|a| a.is_complete())
            .unwrap_or(false);
        if !complete {
            // All-or-nothing: one bad vendor fails the whole run.
            return Err(SettlementError::MissingVendorAccount {
                vendor: vendor_accounts
                    .get(&vendor_id)
                    .map(|a| a.account_name.clone())
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| format!("Vendor #{}", vendor_id)),
            });
        }

        match vendor_totals.iter_mut().find(|(id, _)| *id == vendor_id) {
            Some((_, total)) => *total += extended,
            None => vendor_totals.push((vendor_id, extended)),
        }
    }

    if vendor_totals.is_empty() {
        return Err(SettlementError::NoVendorItems);
    }

    item_total = round_money(item_total);
    let admin_amount = round_money(item_total * admin_percentage / dec!(100));
    let vendor_pool = round_money(item_total - admin_amount);

    let mut instructions = Vec::with_capacity(vendor_totals.len() + 1);
    instructions.push(SettlementInstruction {
        account: admin_account.clone(),
        amount: admin_amount,
    });

    if vendor_totals.len() == 1 {
        // Single vendor takes the whole pool; no proportional rounding.
        let (vendor_id, _) = vendor_totals[0];
        instructions.push(SettlementInstruction {
            account: vendor_accounts[&vendor_id].clone(),
            amount: vendor_pool,
        });
    } else {
        let mut remainder = vendor_pool;
        let last_index = vendor_totals.len() - 1;

        for (index, (vendor_id, vendor_total)) in vendor_totals.iter().enumerate() {
            let amount = if index == last_index {
                // The last vendor absorbs whatever rounding left behind so the
                // instruction sum matches the item total to the cent.
                remainder
            } else {
                let share = round_money(vendor_pool * vendor_total / item_total);
                remainder -= share;
                share
            };

            instructions.push(SettlementInstruction {
                account: vendor_accounts[vendor_id].clone(),
                amount,
            });
        }
    }

    // Diagnostic only; never used for control flow.
    let settlement_total: Decimal = instructions.iter().map(|i| i.amount).sum();
    if (item_total - settlement_total).abs() > dec!(0.001) {
        debug!(
            "Settlement verification drift: item total {} vs settlement total {}",
            item_total, settlement_total
        );
    }

    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::models::AccountOwner;

    fn admin() -> PayoutAccount {
        PayoutAccount {
            account_name: "Marketplace Ltd".into(),
            account_number: "0011223344".into(),
            bank_code: "044".into(),
            owner: AccountOwner::Admin,
        }
    }

    fn vendor(id: VendorId) -> PayoutAccount {
        PayoutAccount {
            account_name: format!("Vendor {}", id),
            account_number: format!("0000000{:03}", id),
            bank_code: "058".into(),
            owner: AccountOwner::Vendor(id),
        }
    }

    fn item(price: Decimal, qty: u32, vendor: Option<VendorId>) -> LineItem {
        LineItem {
            name: "Widget".into(),
            description: "A widget".into(),
            unit_price: price,
            quantity: qty,
            vendor,
        }
    }

    fn accounts(ids: &[VendorId]) -> HashMap<VendorId, PayoutAccount> {
        ids.iter().map(|&id| (id, vendor(id))).collect()
    }

    #[test]
    fn two_vendor_split_matches_worked_example() {
        // 100.00 x1 (vendor A) + 50.00 x2 (vendor B), admin 10%
        let items = vec![
            item(dec!(100.00), 1, Some(1)),
            item(dec!(50.00), 2, Some(2)),
        ];
        let result =
            compute_settlement(&items, &admin(), dec!(10), &accounts(&[1, 2])).unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(result[0].amount, dec!(20.00));
        assert_eq!(result[1].amount, dec!(90.00));
        assert_eq!(result[2].amount, dec!(90.00));
        assert_eq!(result[0].account.owner, AccountOwner::Admin);
    }

    #[test]
    fn single_vendor_takes_whole_pool_without_proportional_rounding() {
        let items = vec![item(dec!(33.33), 3, Some(5))];
        let result =
            compute_settlement(&items, &admin(), dec!(10), &accounts(&[5])).unwrap();

        // item total 99.99, admin 10.00 (round half-up of 9.999), pool 89.99
        assert_eq!(result[0].amount, dec!(10.00));
        assert_eq!(result[1].amount, dec!(89.99));
    }

    #[test]
    fn last_vendor_absorbs_rounding_remainder() {
        let items = vec![
            item(dec!(33.33), 1, Some(1)),
            item(dec!(33.33), 1, Some(2)),
            item(dec!(33.34), 1, Some(3)),
        ];
        let result =
            compute_settlement(&items, &admin(), dec!(7), &accounts(&[1, 2, 3])).unwrap();

        let total: Decimal = result.iter().map(|i| i.amount).sum();
        assert_eq!(total, dec!(100.00));

        // The last vendor's amount is exactly what remains after the others.
        let expected_last = dec!(100.00) - result[0].amount - result[1].amount - result[2].amount;
        assert_eq!(result[3].amount, expected_last);
    }

    #[test]
    fn sum_equals_total_across_percentage_sweep() {
        let items = vec![
            item(dec!(19.99), 3, Some(1)),
            item(dec!(7.77), 2, Some(2)),
            item(dec!(101.01), 1, Some(3)),
        ];
        let expected_total = dec!(59.97) + dec!(15.54) + dec!(101.01);

        for pct in 0..=100 {
            let result =
                compute_settlement(&items, &admin(), Decimal::from(pct), &accounts(&[1, 2, 3]))
                    .unwrap();
            let sum: Decimal = result.iter().map(|i| i.amount).sum();
            assert_eq!(sum, expected_total, "drift at {}%", pct);
            assert!(result.iter().all(|i| i.amount >= Decimal::ZERO));
        }
    }

    #[test]
    fn shipping_line_counts_toward_total_but_not_vendor_grouping() {
        let items = vec![
            item(dec!(100.00), 1, Some(1)),
            LineItem {
                name: "Local Pickup".into(),
                description: "Shipping via Local Pickup".into(),
                unit_price: dec!(10.00),
                quantity: 1,
                vendor: None,
            },
        ];
        let result =
            compute_settlement(&items, &admin(), dec!(10), &accounts(&[1])).unwrap();

        // total 110.00 -> admin 11.00, single vendor pool 99.00
        assert_eq!(result[0].amount, dec!(11.00));
        assert_eq!(result[1].amount, dec!(99.00));
    }

    #[test]
    fn missing_vendor_account_names_the_vendor_and_yields_no_instructions() {
        let mut vendors = accounts(&[1]);
        vendors.insert(
            2,
            PayoutAccount {
                account_name: "Chidi Stores".into(),
                account_number: String::new(),
                bank_code: "058".into(),
                owner: AccountOwner::Vendor(2),
            },
        );
        let items = vec![
            item(dec!(10.00), 1, Some(1)),
            item(dec!(10.00), 1, Some(2)),
        ];

        let err = compute_settlement(&items, &admin(), dec!(10), &vendors).unwrap_err();
        assert_eq!(
            err,
            SettlementError::MissingVendorAccount {
                vendor: "Chidi Stores".into()
            }
        );
    }

    #[test]
    fn unknown_vendor_falls_back_to_numeric_name() {
        let items = vec![item(dec!(10.00), 1, Some(42))];
        let err =
            compute_settlement(&items, &admin(), dec!(10), &HashMap::new()).unwrap_err();
        assert_eq!(
            err,
            SettlementError::MissingVendorAccount {
                vendor: "Vendor #42".into()
            }
        );
    }

    #[test]
    fn incomplete_admin_account_fails_before_vendor_lookup() {
        let broken_admin = PayoutAccount {
            account_name: String::new(),
            account_number: "0011223344".into(),
            bank_code: "044".into(),
            owner: AccountOwner::Admin,
        };
        // Vendor 9 has no account either, but admin is checked first.
        let items = vec![item(dec!(10.00), 1, Some(9))];
        let err =
            compute_settlement(&items, &broken_admin, dec!(10), &HashMap::new()).unwrap_err();
        assert_eq!(err, SettlementError::MissingAdminAccount);
    }

    #[test]
    fn percentage_out_of_range_rejected() {
        let items = vec![item(dec!(10.00), 1, Some(1))];
        let err =
            compute_settlement(&items, &admin(), dec!(100.5), &accounts(&[1])).unwrap_err();
        assert!(matches!(err, SettlementError::InvalidPercentage(_)));
    }

    #[test]
    fn order_with_only_shipping_rows_rejected() {
        let items = vec![item(dec!(5.00), 1, None)];
        let err = compute_settlement(&items, &admin(), dec!(10), &HashMap::new()).unwrap_err();
        assert_eq!(err, SettlementError::NoVendorItems);
    }

    #[test]
    fn hundred_percent_admin_leaves_zero_vendor_pool() {
        let items = vec![
            item(dec!(40.00), 1, Some(1)),
            item(dec!(60.00), 1, Some(2)),
        ];
        let result =
            compute_settlement(&items, &admin(), dec!(100), &accounts(&[1, 2])).unwrap();
        assert_eq!(result[0].amount, dec!(100.00));
        assert_eq!(result[1].amount, dec!(0.00));
        assert_eq!(result[2].amount, dec!(0.00));
    }
}
