//! Integration tests for the RFM dashboard

use rfm_dashboard::{
    load_order_table, run_dashboard, DataError, DatasetCache, DatasetPaths, Filters, Segment,
};
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

/// Write the six source tables for a small store
///
/// Customer c1 buys twice (orders o1, o2) early in toys; c2 buys once, late,
/// in toys; c3 buys once in garden with a score-1 review.
fn create_test_dataset() -> TempDir {
    let dir = tempdir().unwrap();
    write_tables(dir.path());
    dir
}

fn write_tables(root: &Path) {
    fs::write(
        root.join("customers_dataset.csv"),
        "customer_id,customer_unique_id,customer_city\n\
         c1,u1,sao paulo\n\
         c2,u2,campinas\n\
         c3,u3,curitiba\n\
         c4,u4,recife\n",
    )
    .unwrap();
    fs::write(
        root.join("orders_dataset.csv"),
        "order_id,customer_id,order_status,order_purchase_timestamp\n\
         o1,c1,delivered,2018-01-01 09:15:00\n\
         o2,c1,delivered,2018-01-01 20:40:00\n\
         o3,c2,delivered,2018-01-10 21:00:00\n\
         o4,c3,delivered,2018-01-04 13:00:00\n\
         o5,c4,canceled,2018-01-06 08:00:00\n",
    )
    .unwrap();
    fs::write(
        root.join("order_reviews_dataset.csv"),
        "review_id,order_id,review_score\n\
         r1,o1,5\n\
         r2,o2,4\n\
         r3,o3,5\n\
         r4,o4,1\n",
    )
    .unwrap();
    fs::write(
        root.join("order_items_dataset.csv"),
        "order_id,order_item_id,product_id,seller_id,price\n\
         o1,1,p1,s1,200.0\n\
         o2,1,p1,s1,100.0\n\
         o3,1,p1,s1,100.0\n\
         o4,1,p2,s2,35.5\n\
         o5,1,p2,s2,10.0\n",
    )
    .unwrap();
    fs::write(
        root.join("products_dataset.csv"),
        "product_id,product_category_name,product_weight_g\n\
         p1,brinquedos,300\n\
         p2,moveis_jardim,1200\n",
    )
    .unwrap();
    fs::write(
        root.join("product_category_name_translation.csv"),
        "product_category_name,product_category_name_english\n\
         brinquedos,toys\n\
         moveis_jardim,garden\n",
    )
    .unwrap();
}

#[test]
fn test_load_joins_all_tables() {
    let dir = create_test_dataset();
    let table = load_order_table(dir.path(), &DatasetPaths::default()).unwrap();

    // o5 has no review, so the inner join drops it
    assert_eq!(table.len(), 4);
    assert_eq!(table.categories().unwrap(), vec!["garden", "toys"]);
}

#[test]
fn test_two_customer_scenario_end_to_end() {
    let dir = create_test_dataset();
    let out = tempdir().unwrap();
    let table = load_order_table(dir.path(), &DatasetPaths::default()).unwrap();

    let filters = Filters {
        categories: Some(vec!["toys".to_string()]),
        segments: None,
    };
    let report = run_dashboard(&table, &filters, out.path()).unwrap();

    assert_eq!(report.records.len(), 2);
    let c1 = report.records.iter().find(|r| r.customer_id == "c1").unwrap();
    assert_eq!(c1.frequency, 2);
    assert_eq!(c1.monetary, 300.0);
    assert_eq!(c1.recency, 9);
    assert_eq!(c1.rfm_score, 4.62);
    assert_eq!(c1.segment, Segment::Top);

    let c2 = report.records.iter().find(|r| r.customer_id == "c2").unwrap();
    assert_eq!(c2.recency, 0);
    assert_eq!(c2.rfm_score, 2.88);
    assert_eq!(c2.segment, Segment::LowValue);

    assert!(report.charts.hourly_orders.exists());
    assert!(report.charts.low_review_share.exists());
    assert!(report.charts.segment_counts.exists());
}

#[test]
fn test_filters_shift_the_universe() {
    let dir = create_test_dataset();
    let out = tempdir().unwrap();
    let table = load_order_table(dir.path(), &DatasetPaths::default()).unwrap();

    let everything = Filters {
        categories: Some(table.categories().unwrap()),
        segments: None,
    };
    let all = run_dashboard(&table, &everything, out.path()).unwrap();
    assert_eq!(all.records.len(), 3);
    // c2 holds the latest purchase across all categories
    let c3 = all.records.iter().find(|r| r.customer_id == "c3").unwrap();
    assert_eq!(c3.recency, 6);

    let garden = Filters {
        categories: Some(vec!["garden".to_string()]),
        segments: None,
    };
    let only_garden = run_dashboard(&table, &garden, out.path()).unwrap();
    assert_eq!(only_garden.records.len(), 1);
    assert_eq!(only_garden.records[0].recency, 0);
    assert_eq!(only_garden.records[0].segment, Segment::Top);
    assert_eq!(only_garden.low_review_share[0].percentage, 100.0);
}

#[test]
fn test_segment_filter() {
    let dir = create_test_dataset();
    let out = tempdir().unwrap();
    let table = load_order_table(dir.path(), &DatasetPaths::default()).unwrap();

    let filters = Filters {
        categories: Some(vec!["toys".to_string()]),
        segments: Some(vec![Segment::Top]),
    };
    let report = run_dashboard(&table, &filters, out.path()).unwrap();
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.filtered_records.len(), 1);
    assert_eq!(report.filtered_records[0].customer_id, "c1");
    assert_eq!(report.segment_counts, vec![(Segment::Top, 1)]);
}

#[test]
fn test_cache_reuses_loaded_table() {
    let dir = create_test_dataset();
    let mut cache = DatasetCache::new(dir.path());

    let first = cache.get_or_load().unwrap().clone();
    fs::remove_file(dir.path().join("products_dataset.csv")).unwrap();
    let second = cache.get_or_load().unwrap().clone();
    assert!(first.frame().equals_missing(second.frame()));

    cache.invalidate();
    assert!(cache.get_or_load().is_err());

    write_tables(dir.path());
    assert_eq!(cache.get_or_load().unwrap().len(), 4);
}

#[test]
fn test_bad_timestamp_is_reported() {
    let dir = create_test_dataset();
    fs::write(
        dir.path().join("orders_dataset.csv"),
        "order_id,customer_id,order_purchase_timestamp\n\
         o1,c1,01/02/2018 nine o'clock\n",
    )
    .unwrap();

    let err = load_order_table(dir.path(), &DatasetPaths::default()).unwrap_err();
    match err.downcast_ref::<DataError>() {
        Some(DataError::InvalidTimestamp { table, column, row, .. }) => {
            assert_eq!(table, "orders_dataset.csv");
            assert_eq!(*column, "order_purchase_timestamp");
            assert_eq!(*row, 2);
        }
        other => panic!("expected an invalid timestamp error, got {:?}", other),
    }
}

#[test]
fn test_null_order_key_is_reported() {
    let dir = create_test_dataset();
    fs::write(
        dir.path().join("order_items_dataset.csv"),
        "order_id,order_item_id,product_id,seller_id,price\n\
         o1,1,p1,s1,200.0\n\
         ,1,p1,s1,100.0\n",
    )
    .unwrap();

    let err = load_order_table(dir.path(), &DatasetPaths::default()).unwrap_err();
    assert_eq!(
        err.downcast_ref::<DataError>(),
        Some(&DataError::NullField {
            table: "order_items_dataset.csv".to_string(),
            column: "order_id",
            row: 3,
        })
    );
}

#[test]
fn test_unreviewed_score_still_loads() {
    let dir = create_test_dataset();
    fs::write(
        dir.path().join("order_reviews_dataset.csv"),
        "review_id,order_id,review_score\n\
         r1,o1,5\n\
         r2,o2,\n\
         r3,o3,5\n\
         r4,o4,1\n",
    )
    .unwrap();
    let out = tempdir().unwrap();
    let table = load_order_table(dir.path(), &DatasetPaths::default()).unwrap();
    assert_eq!(table.len(), 4);

    let filters = Filters {
        categories: Some(vec!["toys".to_string()]),
        segments: None,
    };
    let report = run_dashboard(&table, &filters, out.path()).unwrap();
    let c1 = report.records.iter().find(|r| r.customer_id == "c1").unwrap();
    assert_eq!(c1.frequency, 2);
    assert_eq!(report.low_review_share[0].total, 3);
    assert_eq!(report.low_review_share[0].count, 0);
}

#[test]
fn test_missing_file_fails() {
    let dir = tempdir().unwrap();
    assert!(load_order_table(dir.path(), &DatasetPaths::default()).is_err());
}
