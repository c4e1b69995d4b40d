//! Test fixtures - directive module sources for testing

use indoc::indoc;

pub const ENTRY: &str = "entry.hot";
pub const ACCEPTED_MODULE: &str = "accepted-module.hot";
pub const NOT_ACCEPTED_SUBMODULE: &str = "not-accepted-submodule.hot";
pub const NOT_ACCEPTED_SUBMODULE_LEVEL_TWO: &str = "not-accepted-submodule-level-two.hot";

/// Four modules in a chain; the entry and the second module accept.
///
/// entry -> accepted-module -> not-accepted-submodule -> not-accepted-submodule-level-two
pub fn accept_chain() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            ENTRY,
            indoc! {"
                require ./accepted-module.hot
                print entry
                accept
            "},
        ),
        (
            ACCEPTED_MODULE,
            indoc! {"
                require ./not-accepted-submodule.hot
                print accepted-module
                accept
            "},
        ),
        (
            NOT_ACCEPTED_SUBMODULE,
            indoc! {"
                require ./not-accepted-submodule-level-two.hot
                print not-accepted-submodule
            "},
        ),
        (
            NOT_ACCEPTED_SUBMODULE_LEVEL_TWO,
            "print not-accepted-submodule-level-two\n",
        ),
    ]
}

/// Entry that requires a single leaf, nothing accepts
pub fn unaccepted_pair() -> Vec<(&'static str, &'static str)> {
    vec![
        (ENTRY, "require ./leaf.hot\nprint entry\n"),
        ("leaf.hot", "print leaf\n"),
    ]
}

/// Two accepting siblings under one parent, both depending on `shared.hot`
pub fn accepting_siblings() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            ENTRY,
            indoc! {"
                require ./left.hot
                require ./right.hot
                accept
            "},
        ),
        ("left.hot", "require ./shared.hot\naccept\n"),
        ("right.hot", "require ./shared.hot\naccept\n"),
        ("shared.hot", "print shared\n"),
    ]
}

/// Append a line to a module source, the way an edit would
pub fn edited(source: &str, line: &str) -> String {
    format!("{}{}\n", source, line)
}
