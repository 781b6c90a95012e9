use super::*;
use std::sync::Barrier;
use std::thread;

#[test]
fn test_racing_masters_single_assignment() {
    let (manager, _rx) = create_test_manager();
    let manager = Arc::new(manager);

    for round in 0..10 {
        let id = create_order(&manager, &format!("race-{round}"));
        let masters = [
            add_master(&manager, REGION, 2000),
            add_master(&manager, REGION, 2000),
        ];
        let barrier = Arc::new(Barrier::new(masters.len()));

        let handles: Vec<_> = masters
            .iter()
            .map(|master| {
                let manager = manager.clone();
                let barrier = barrier.clone();
                let master = *master;
                thread::spawn(move || {
                    barrier.wait();
                    manager.start_calculation(&master, id)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners: Vec<usize> = results
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_ok())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(winners.len(), 1, "round {round}: exactly one master wins");
        let loser = 1 - winners[0];
        assert!(results[loser].as_ref().unwrap_err().is_conflict());

        let order = order_of(&manager, id);
        assert_eq!(order.master_id, Some(masters[winners[0]].user_id));
        assert_eq!(balance(&manager, masters[winners[0]].user_id), Decimal::ZERO);
        assert_eq!(balance(&manager, masters[loser].user_id), Decimal::from(2000));
        assert_eq!(manager.storage().get_status_changes(id).unwrap().len(), 2);
    }
}

#[test]
fn test_concurrent_duplicate_creates() {
    let (manager, _rx) = create_test_manager();
    let manager = Arc::new(manager);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.create_order(None, create_request("same-token")).unwrap()
            })
        })
        .collect();
    let responses: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(responses.windows(2).all(|w| w[0].order_id == w[1].order_id));
    assert!(responses.windows(2).all(|w| w[0].driver_id == w[1].driver_id));
    assert_eq!(manager.storage().get_all_orders().unwrap().len(), 1);
    assert_eq!(manager.storage().get_all_users().unwrap().len(), 1);
}
