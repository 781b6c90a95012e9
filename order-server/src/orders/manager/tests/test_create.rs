use super::*;

#[test]
fn test_same_guarantee_returns_same_order() {
    let (manager, mut rx) = create_test_manager();
    let first = manager.create_order(None, create_request("dup-1")).unwrap();
    let second = manager.create_order(None, create_request("dup-1")).unwrap();

    assert_eq!(first.order_id, second.order_id);
    assert_eq!(first.driver_id, second.driver_id);
    assert!(second.driver_token.is_some());
    assert_eq!(manager.storage().get_all_orders().unwrap().len(), 1);
    assert_eq!(manager.storage().get_status_changes(first.order_id).unwrap().len(), 1);
    assert_eq!(drain(&mut rx).len(), 1, "replay must not notify again");
}

#[test]
fn test_driver_required() {
    let (manager, _rx) = create_test_manager();
    let req = CreateOrderRequest {
        driver_phone: None,
        ..create_request("nodriver-1")
    };
    let err = manager.create_order(None, req).unwrap_err();
    assert!(matches!(err, OrderError::DriverRequired));
    assert!(manager.storage().get_all_users().unwrap().is_empty());

    // an authenticated customer still has to name a driver
    let customer = add_user(&manager, UserRole::Customer, None, 0);
    let req = CreateOrderRequest {
        driver_phone: Some("   ".into()),
        ..create_request("nodriver-2")
    };
    assert!(matches!(
        manager.create_order(Some(&customer), req).unwrap_err(),
        OrderError::DriverRequired
    ));
}

#[test]
fn test_unknown_region_rolls_back_driver() {
    let (manager, _rx) = create_test_manager();
    let req = CreateOrderRequest {
        region_id: 99,
        ..create_request("region-404")
    };
    assert!(matches!(
        manager.create_order(None, req).unwrap_err(),
        OrderError::RegionNotFound(99)
    ));
    assert!(manager.storage().get_all_users().unwrap().is_empty());
    assert!(manager.storage().get_all_orders().unwrap().is_empty());
}

#[test]
fn test_invalid_request() {
    let (manager, _rx) = create_test_manager();
    let req = CreateOrderRequest {
        guarantee_uuid: String::new(),
        ..create_request("")
    };
    assert!(matches!(
        manager.create_order(None, req).unwrap_err(),
        OrderError::Validation(_)
    ));
}

#[test]
fn test_driver_reused_by_phone() {
    let (manager, _rx) = create_test_manager();
    let first = manager.create_order(None, create_request("phone-1")).unwrap();
    let second = manager
        .create_order(
            None,
            CreateOrderRequest {
                driver_name: Some("Ivan".into()),
                ..create_request("phone-2")
            },
        )
        .unwrap();

    assert_ne!(first.order_id, second.order_id);
    assert_eq!(first.driver_id, second.driver_id);
    let driver = manager.storage().get_user(first.driver_id).unwrap().unwrap();
    assert_eq!(driver.role, UserRole::Driver);
    assert_eq!(driver.name.as_deref(), Some("Ivan"));
}

#[test]
fn test_authenticated_driver_merges_contacts() {
    let (manager, _rx) = create_test_manager();
    let driver = add_user(&manager, UserRole::Driver, None, 0);
    let req = CreateOrderRequest {
        driver_phone: Some("+70000000001".into()),
        driver_email: Some("driver@example.com".into()),
        ..create_request("auth-driver-1")
    };

    let resp = manager.create_order(Some(&driver), req).unwrap();
    assert_eq!(resp.driver_id, driver.user_id);
    assert!(resp.driver_token.is_none());

    let order = order_of(&manager, resp.order_id);
    assert_eq!(order.customer_id, None);
    let stored = manager.storage().get_user(driver.user_id).unwrap().unwrap();
    assert_eq!(stored.phone.as_deref(), Some("+70000000001"));
    assert_eq!(stored.email.as_deref(), Some("driver@example.com"));

    let history = manager.storage().get_status_changes(order.id).unwrap();
    assert_eq!(history[0].updated_by, driver.user_id);
}

#[test]
fn test_fresh_address_per_order() {
    let (manager, _rx) = create_test_manager();
    let a = order_of(&manager, create_order(&manager, "addr-1"));
    let b = order_of(&manager, create_order(&manager, "addr-2"));
    assert_ne!(a.address_id, b.address_id);

    let address = manager.storage().get_address(a.address_id).unwrap().unwrap();
    assert_eq!(address.region_id, REGION);
    assert_eq!(address.city.as_deref(), Some("Tver"));
}

#[test]
fn test_existing_vehicle_by_id() {
    let (manager, _rx) = create_test_manager();
    let first = order_of(
        &manager,
        manager
            .create_order(
                None,
                CreateOrderRequest {
                    vehicles: vec![truck("MAN", Some("WMA1"), None)],
                    ..create_request("veh-1")
                },
            )
            .unwrap()
            .order_id,
    );
    let vehicle_id = first.vehicle_ids[0];

    let second = manager
        .create_order(
            None,
            CreateOrderRequest {
                vehicles: vec![VehicleInput {
                    id: Some(vehicle_id),
                    ..Default::default()
                }],
                ..create_request("veh-2")
            },
        )
        .unwrap();
    assert_eq!(order_of(&manager, second.order_id).vehicle_ids, vec![vehicle_id]);

    let missing = CreateOrderRequest {
        vehicles: vec![VehicleInput {
            id: Some(777),
            ..Default::default()
        }],
        ..create_request("veh-3")
    };
    assert!(matches!(
        manager.create_order(None, missing).unwrap_err(),
        OrderError::VehicleNotFound(777)
    ));
}

#[test]
fn test_duplicate_vin_converges_on_canonical_vehicle() {
    let (manager, _rx) = create_test_manager();
    let first = manager
        .create_order(
            None,
            CreateOrderRequest {
                vehicles: vec![truck("Volvo", Some("YV2RT40A"), None)],
                ..create_request("merge-1")
            },
        )
        .unwrap();
    let second = manager
        .create_order(
            None,
            CreateOrderRequest {
                vehicles: vec![truck("Volvo FH", Some("yv2rt40a"), Some("A123BC"))],
                ..create_request("merge-2")
            },
        )
        .unwrap();

    let a = order_of(&manager, first.order_id);
    let b = order_of(&manager, second.order_id);
    assert_eq!(a.vehicle_ids, b.vehicle_ids);

    let canonical = manager.storage().get_vehicle(a.vehicle_ids[0]).unwrap().unwrap();
    assert!(!canonical.is_merged);
    assert_eq!(canonical.brand.as_deref(), Some("Volvo"));
    assert_eq!(canonical.number.as_deref(), Some("A123BC"));

    // the second record survives as a merged pointer
    let duplicate = manager
        .storage()
        .get_vehicle(canonical.id + 1)
        .unwrap()
        .unwrap();
    assert!(duplicate.is_merged);
    assert_eq!(duplicate.merged_to, Some(canonical.id));
}

#[test]
fn test_vehicle_correction_merges_and_repoints() {
    let (manager, _rx) = create_test_manager();
    let first = manager
        .create_order(
            None,
            CreateOrderRequest {
                vehicles: vec![truck("DAF", Some("XLRTE47"), None)],
                ..create_request("fix-1")
            },
        )
        .unwrap();
    let second = manager
        .create_order(
            None,
            CreateOrderRequest {
                driver_phone: Some("+79990009999".into()),
                vehicles: vec![truck("DAF", None, Some("K777KK"))],
                ..create_request("fix-2")
            },
        )
        .unwrap();
    let canonical_id = order_of(&manager, first.order_id).vehicle_ids[0];
    let typo_id = order_of(&manager, second.order_id).vehicle_ids[0];
    assert_ne!(canonical_id, typo_id);

    let stranger = add_user(&manager, UserRole::Customer, None, 0);
    let req = shared::order::UpdateOrderVehicleRequest {
        order_id: second.order_id,
        vehicle_id: typo_id,
        vin: Some("XLRTE47".into()),
        ..Default::default()
    };
    assert!(
        manager
            .update_order_vehicle(&stranger, req.clone())
            .unwrap_err()
            .is_forbidden()
    );

    let driver = Actor::new(second.driver_id, UserRole::Driver);
    let vehicle = manager.update_order_vehicle(&driver, req).unwrap();
    assert_eq!(vehicle.id, canonical_id);
    assert_eq!(vehicle.number.as_deref(), Some("K777KK"));
    assert_eq!(order_of(&manager, second.order_id).vehicle_ids, vec![canonical_id]);

    let typo = manager.storage().get_vehicle(typo_id).unwrap().unwrap();
    assert!(typo.is_merged);
    assert_eq!(typo.merged_to, Some(canonical_id));
}

#[test]
fn test_vehicle_correction_requires_attachment() {
    let (manager, _rx) = create_test_manager();
    let resp = manager.create_order(None, create_request("fix-3")).unwrap();
    let admin = add_user(&manager, UserRole::Admin, None, 0);
    let req = shared::order::UpdateOrderVehicleRequest {
        order_id: resp.order_id,
        vehicle_id: 1,
        brand: Some("Scania".into()),
        ..Default::default()
    };
    assert!(matches!(
        manager.update_order_vehicle(&admin, req).unwrap_err(),
        OrderError::VehicleNotFound(1)
    ));
}

#[test]
fn test_chained_merges_resolve_to_live_vehicle() {
    let (manager, _rx) = create_test_manager();
    let create = |guarantee: &str, vin: &str| {
        manager
            .create_order(
                None,
                CreateOrderRequest {
                    vehicles: vec![truck("Scania", Some(vin), None)],
                    ..create_request(guarantee)
                },
            )
            .unwrap()
            .order_id
    };
    let first = create("chain-1", "VIN-ONE");
    let a = order_of(&manager, first).vehicle_ids[0];
    let second = create("chain-2", "VIN-ONE");
    let b = a + 1;
    assert_eq!(order_of(&manager, second).vehicle_ids, vec![a]);
    let third = create("chain-3", "VIN-TWO");
    let c = order_of(&manager, third).vehicle_ids[0];
    assert_ne!(a, c);

    // a 改成 c 的 VIN 后并入 c，b 也要跟着指向 c
    let admin = add_user(&manager, UserRole::Admin, None, 0);
    let merged = manager
        .update_order_vehicle(
            &admin,
            shared::order::UpdateOrderVehicleRequest {
                order_id: first,
                vehicle_id: a,
                vin: Some("VIN-TWO".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(merged.id, c);

    let vehicle = |id: i64| manager.storage().get_vehicle(id).unwrap().unwrap();
    assert_eq!(vehicle(a).merged_to, Some(c));
    assert!(vehicle(b).is_merged);
    assert_eq!(vehicle(b).merged_to, Some(c));
    assert!(!vehicle(c).is_merged);
    assert_eq!(order_of(&manager, first).vehicle_ids, vec![c]);
    assert_eq!(order_of(&manager, second).vehicle_ids, vec![c]);

    let fourth = manager
        .create_order(
            None,
            CreateOrderRequest {
                vehicles: vec![VehicleInput {
                    id: Some(b),
                    ..Default::default()
                }],
                ..create_request("chain-4")
            },
        )
        .unwrap();
    assert_eq!(order_of(&manager, fourth.order_id).vehicle_ids, vec![c]);
    assert!(!vehicle(c).is_merged);
    assert_eq!(manager.storage().get_vehicle_orders(c).unwrap().len(), 4);
    assert!(manager.storage().get_vehicle_orders(a).unwrap().is_empty());
}
