use memdex::{
    all_of, any_of, attr, doc, Document, MemdexCollection, ParserProvider, PredicateParser,
};
use memdex_int_test::test_util::{ids_sorted, scenario_collection, MutableItem};
use std::rc::Rc;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_filter_true_is_the_whole_collection() {
    let (collection, _objects) = scenario_collection().unwrap();
    let everything = collection.filter("TRUE").unwrap();
    assert_eq!(ids_sorted(&everything), ids_sorted(&collection.row_ids()));
    assert_eq!(everything.len(), collection.len());
}

#[test]
fn test_filter_false_is_empty() {
    let (collection, _objects) = scenario_collection().unwrap();
    assert!(collection.filter("FALSE").unwrap().is_empty());
}

#[test]
fn test_length_tracks_adds_and_discards() {
    let mut collection = MemdexCollection::builder()
        .hash_index("a")
        .build()
        .unwrap();
    let objects: Vec<_> = (0..10).map(|i| Rc::new(doc! { "a": i })).collect();

    collection.update(objects.iter().cloned()).unwrap();
    assert_eq!(collection.len(), 10);

    collection.discard(&objects[3]).unwrap();
    collection.discard(&objects[3]).unwrap(); // second discard is a no-op
    assert_eq!(collection.len(), 9);

    collection.add(objects[5].clone()).unwrap(); // re-add of present is a no-op
    assert_eq!(collection.len(), 9);

    collection.clear();
    assert_eq!(collection.len(), 0);
    assert!(collection.is_empty());
}

#[test]
fn test_optimization_preserves_semantics() {
    let (collection, _objects) = scenario_collection().unwrap();
    let predicates = [
        "a = 0",
        "a >= 0 AND a < 2",
        "a >= 0 AND a < 2 AND b = 59",
        "a IN [0, 2] OR b = 7",
        "NOT a = 0",
        "a = 0 OR (a = 1 OR a = 2)",
        "b > 7 AND b <= 59 AND a != 1",
    ];
    for predicate in predicates {
        let condition = PredicateParser.parse(predicate).unwrap();
        let plan = collection.plan(&condition);
        let unoptimized = collection.execute(&plan).unwrap();
        let optimized = collection.execute(&collection.optimize(plan)).unwrap();
        assert_eq!(
            ids_sorted(&unoptimized),
            ids_sorted(&optimized),
            "optimization changed the result of {:?}",
            predicate
        );
    }
}

#[test]
fn test_filter_commutativity() {
    let (collection, _objects) = scenario_collection().unwrap();
    assert_eq!(
        ids_sorted(&collection.filter("a = 0 AND b = 59").unwrap()),
        ids_sorted(&collection.filter("b = 59 AND a = 0").unwrap()),
    );
    assert_eq!(
        ids_sorted(&collection.filter("a = 0 OR b = 59").unwrap()),
        ids_sorted(&collection.filter("b = 59 OR a = 0").unwrap()),
    );
}

#[test]
fn test_filter_idempotence() {
    let (collection, _objects) = scenario_collection().unwrap();
    assert_eq!(
        ids_sorted(&collection.filter("a = 0 AND a = 0").unwrap()),
        ids_sorted(&collection.filter("a = 0").unwrap()),
    );
}

#[test]
fn test_optimize_is_structurally_idempotent() {
    let (collection, _objects) = scenario_collection().unwrap();
    let predicates = [
        "a >= 0 AND a < 2 AND b = 59",
        "a = 0 OR a = 2",
        "a IN [0, 2]",
        "NOT a = 0",
        "a >= 2 AND a < 1",
    ];
    for predicate in predicates {
        let condition = PredicateParser.parse(predicate).unwrap();
        let once = collection.optimize(collection.plan(&condition));
        let twice = collection.optimize(once.clone());
        assert_eq!(once, twice, "optimizing {:?} twice changed the plan", predicate);
    }
}

#[test]
fn test_string_and_fluent_queries_agree() {
    let (collection, _objects) = scenario_collection().unwrap();
    let via_string = collection.filter("a >= 0 AND a < 2 AND b = 59").unwrap();
    let via_fluent = collection
        .filter(attr("a").ge(0).and(attr("a").lt(2)).and(attr("b").eq(59)))
        .unwrap();
    assert_eq!(ids_sorted(&via_string), ids_sorted(&via_fluent));
}

#[test]
fn test_all_of_and_any_of_match_their_string_forms() {
    let (collection, _objects) = scenario_collection().unwrap();
    let conjunction = collection
        .filter(all_of(vec![
            attr("a").ge(0),
            attr("a").lt(2),
            attr("b").eq(59),
        ]))
        .unwrap();
    assert_eq!(
        ids_sorted(&conjunction),
        ids_sorted(&collection.filter("a >= 0 AND a < 2 AND b = 59").unwrap()),
    );

    let disjunction = collection
        .filter(any_of(vec![attr("a").eq(1), attr("b").eq(7)]))
        .unwrap();
    assert_eq!(
        ids_sorted(&disjunction),
        ids_sorted(&collection.filter("a = 1 OR b = 7").unwrap()),
    );

    // empty folds are the constant conditions
    assert_eq!(
        collection.filter(all_of(vec![])).unwrap().len(),
        collection.len()
    );
    assert!(collection.filter(any_of(vec![])).unwrap().is_empty());
}

#[test]
fn test_filter_results_compose_as_sets() {
    let (collection, _objects) = scenario_collection().unwrap();
    let zeros = collection.filter("a = 0").unwrap(); // rows 0, 3
    let fifty_nines = collection.filter("b = 59").unwrap(); // rows 0, 1, 2

    assert_eq!(
        ids_sorted(&zeros.union(&fifty_nines)),
        ids_sorted(&collection.filter("a = 0 OR b = 59").unwrap()),
    );
    assert_eq!(
        ids_sorted(&zeros.intersection(&fifty_nines)),
        ids_sorted(&collection.filter("a = 0 AND b = 59").unwrap()),
    );
    assert_eq!(ids_sorted(&zeros.difference(&fifty_nines)), vec![3]);
    // rows satisfying exactly one of the two predicates
    assert_eq!(
        ids_sorted(&zeros.symmetric_difference(&fifty_nines)),
        vec![1, 2, 3]
    );
    // composition leaves the inputs untouched
    assert_eq!(ids_sorted(&zeros), vec![0, 3]);
    assert_eq!(ids_sorted(&fifty_nines), vec![0, 1, 2]);
}

#[test]
fn test_projection_follows_row_id_order() {
    let (collection, objects) = scenario_collection().unwrap();
    let result = collection.filter("b = 59").unwrap();
    let listed = collection.list_objects(&result);
    let listed_ptrs: Vec<_> = listed.iter().map(Rc::as_ptr).collect();
    let expected_ptrs: Vec<_> = objects[..3].iter().map(Rc::as_ptr).collect();
    assert_eq!(listed_ptrs, expected_ptrs);
}

#[test]
fn test_refresh_only_touches_changed_indexes() {
    let objects = vec![MutableItem::new(1, 10), MutableItem::new(2, 20)];
    let mut collection = MemdexCollection::builder()
        .range_index("a")
        .range_index("b")
        .build_from(objects.iter().cloned())
        .unwrap();

    // no attribute changed: refresh is a no-op
    collection.refresh(&objects[0]).unwrap();
    assert_eq!(ids_sorted(&collection.filter("a = 1").unwrap()), vec![0]);

    objects[0].a.set(7);
    collection.refresh(&objects[0]).unwrap();
    assert!(collection.filter("a = 1").unwrap().is_empty());
    assert_eq!(ids_sorted(&collection.filter("a = 7").unwrap()), vec![0]);
    // b was untouched
    assert_eq!(ids_sorted(&collection.filter("b = 10").unwrap()), vec![0]);
}

#[test]
fn test_type_mismatch_surfaces_as_error() {
    let (collection, _objects) = scenario_collection().unwrap();
    let err = collection.filter("a < 'x'").unwrap_err();
    assert_eq!(err.kind(), &memdex::ErrorKind::TypeMismatch);
}

#[test]
fn test_unparseable_predicate_surfaces_as_error() {
    let (collection, _objects) = scenario_collection().unwrap();
    let err = collection.filter("a ===== 0").unwrap_err();
    assert_eq!(err.kind(), &memdex::ErrorKind::ParseError);
}

#[test]
fn test_document_iteration_matches_insertion() {
    let mut collection = MemdexCollection::builder()
        .hash_index("name")
        .build()
        .unwrap();
    let docs: Vec<_> = ["x", "y", "z"]
        .iter()
        .map(|name| Rc::new(doc! { "name": (*name) }))
        .collect();
    collection.update(docs.iter().cloned()).unwrap();

    let names: Vec<String> = collection
        .iter()
        .filter_map(|d: &Rc<Document>| d.get("name").and_then(|v| v.as_str().map(String::from)))
        .collect();
    assert_eq!(names, vec!["x", "y", "z"]);
}
