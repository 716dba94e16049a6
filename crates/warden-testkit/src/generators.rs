//! Proptest generators for property-based testing.

use proptest::prelude::*;

use warden_core::PrincipalId;
use warden_perms::Authorization;

/// Generate one operation path segment.
pub fn segment() -> impl Strategy<Value = String> {
    "[A-Z][a-z]{0,7}".prop_map(String::from)
}

/// Generate an operation path of 1 to `max_depth` segments.
pub fn operation_path(max_depth: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..=max_depth.max(1))
        .prop_map(|segments| format!("/{}", segments.join("/")))
}

/// Generate a rule level.
pub fn level() -> impl Strategy<Value = i32> {
    -5i32..=5
}

/// Name of the `i`th group in a generated forest.
pub fn group_name(i: usize) -> String {
    format!("g{i}")
}

/// A random principal-group forest with one principal in it.
///
/// `parents[i]` is the index of group `i`'s parent, always lower than `i`,
/// so every generated shape is acyclic.
#[derive(Debug, Clone)]
pub struct ForestParams {
    pub parents: Vec<Option<usize>>,
    /// Indexes of the groups the principal joins directly.
    pub member_of: Vec<usize>,
    /// Index of the group whose ancestry is asked for.
    pub target: usize,
}

impl ForestParams {
    /// Parent chain of group `i`, starting at `i`.
    pub fn chain(&self, i: usize) -> Vec<usize> {
        std::iter::successors(Some(i), |&g| self.parents[g]).collect()
    }

    /// Length of the shortest path from a direct group up to the target.
    pub fn shortest_path_len(&self) -> Option<usize> {
        self.member_of
            .iter()
            .filter_map(|&g| self.chain(g).iter().position(|&a| a == self.target))
            .map(|hops| hops + 1)
            .min()
    }
}

impl Arbitrary for ForestParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (1usize..=12)
            .prop_flat_map(|n| {
                let parents: Vec<BoxedStrategy<Option<usize>>> = (0..n)
                    .map(|i| {
                        if i == 0 {
                            Just(None).boxed()
                        } else {
                            prop::option::of(0..i).boxed()
                        }
                    })
                    .collect();
                (
                    parents,
                    prop::collection::btree_set(0..n, 1..=3),
                    0..n,
                )
            })
            .prop_map(|(parents, member_of, target)| ForestParams {
                parents,
                member_of: member_of.into_iter().collect(),
                target,
            })
            .boxed()
    }
}

/// Build the engine a [`ForestParams`] describes.
pub fn forest_from_params(params: &ForestParams) -> (Authorization, PrincipalId) {
    let mut auth = Authorization::new();
    for (i, parent) in params.parents.iter().enumerate() {
        let parent = parent.map(group_name);
        auth.create_principal_group(&group_name(i), parent.as_deref())
            .expect("generated groups have unique names and earlier parents");
    }

    let principal = auth.register_principal("member");
    for &g in &params.member_of {
        auth.associate_principal_with_group(principal, &group_name(g))
            .expect("generated memberships name existing groups");
    }
    (auth, principal)
}
