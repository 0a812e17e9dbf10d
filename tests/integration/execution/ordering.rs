//! Decision ordering within a cycle

#[cfg(test)]
mod tests {
    use perp_exec::model::decision::{Decision, sort_for_execution};
    use perp_exec::model::types::OrderAction;
    use pretty_assertions::assert_eq;

    fn decision(symbol: &str, action: OrderAction) -> Decision {
        Decision {
            symbol: symbol.into(),
            action,
            leverage: 10,
            position_size_usd: 100.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            confidence: 50.0,
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_close_precedes_open_for_same_symbol() {
        let mut decisions = vec![
            decision("BTCUSDT", OrderAction::OpenShort),
            decision("BTCUSDT", OrderAction::CloseLong),
        ];
        sort_for_execution(&mut decisions);
        let actions: Vec<OrderAction> = decisions.iter().map(|d| d.action).collect();
        assert_eq!(actions, vec![OrderAction::CloseLong, OrderAction::OpenShort]);
    }

    #[test]
    fn test_full_priority_ladder() {
        let mut decisions = vec![
            decision("A", OrderAction::Hold),
            decision("B", OrderAction::OpenLong),
            decision("C", OrderAction::Wait),
            decision("D", OrderAction::CloseShort),
            decision("E", OrderAction::OpenShort),
            decision("F", OrderAction::CloseLong),
        ];
        sort_for_execution(&mut decisions);
        let symbols: Vec<&str> = decisions.iter().map(|d| d.symbol.as_str()).collect();
        // Closes keep relative order (D,F), then opens (B,E), then rest (A,C).
        assert_eq!(symbols, vec!["D", "F", "B", "E", "A", "C"]);
    }
}
