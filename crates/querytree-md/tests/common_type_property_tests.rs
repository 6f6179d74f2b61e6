use proptest::prelude::*;
use querytree_md::{MetadataWorkspace, PrimitiveKind, Property};

fn numeric_kinds() -> Vec<PrimitiveKind> {
    PrimitiveKind::ALL
        .into_iter()
        .filter(|k| k.is_numeric())
        .collect()
}

fn any_kind() -> impl Strategy<Value = PrimitiveKind> {
    prop::sample::select(PrimitiveKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn common_type_is_commutative(a in any_kind(), b in any_kind()) {
        let md = MetadataWorkspace::new();
        let ta = md.primitive(a).unwrap();
        let tb = md.primitive(b).unwrap();
        prop_assert_eq!(md.common_type(ta, tb), md.common_type(tb, ta));
    }

    #[test]
    fn both_sides_promote_to_the_common_type(a in any_kind(), b in any_kind()) {
        let md = MetadataWorkspace::new();
        let ta = md.primitive(a).unwrap();
        let tb = md.primitive(b).unwrap();
        if let Some(common) = md.common_type(ta, tb) {
            prop_assert!(md.is_promotable_to(ta, common));
            prop_assert!(md.is_promotable_to(tb, common));
        }
    }

    #[test]
    fn numerics_always_have_a_common_type(
        a in prop::sample::select(numeric_kinds()),
        b in prop::sample::select(numeric_kinds()),
    ) {
        let md = MetadataWorkspace::new();
        let common = md.common_type(md.primitive(a).unwrap(), md.primitive(b).unwrap());
        prop_assert!(common.is_some());
    }

    #[test]
    fn row_types_are_interned(names in prop::collection::vec("[a-z]{1,6}", 1..5)) {
        let md = MetadataWorkspace::new();
        let int = md.primitive(PrimitiveKind::Int32).unwrap();
        let props = || names.iter().map(|n| Property::new(n.as_str(), int)).collect::<Vec<_>>();
        prop_assert_eq!(md.row_type(props()), md.row_type(props()));
    }
}

#[test]
fn collections_of_widened_elements_widen() {
    let md = MetadataWorkspace::new();
    let int = md.primitive(PrimitiveKind::Int32).unwrap();
    let double = md.primitive(PrimitiveKind::Double).unwrap();
    let common = md.common_type(md.collection_of(int), md.collection_of(double));
    assert_eq!(common, Some(md.collection_of(double)));
}

#[test]
fn string_and_integer_have_no_common_type() {
    let md = MetadataWorkspace::new();
    let int = md.primitive(PrimitiveKind::Int32).unwrap();
    let string = md.primitive(PrimitiveKind::String).unwrap();
    assert_eq!(md.common_type(int, string), None);
}
