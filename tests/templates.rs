//! End-to-end rendering of complete templates.

use pathru::{Library, render, render_with};

#[test]
fn staircase() {
    let out = render(
        "prop steps (1..10) = 3, rise = 10;\n\
         M 0,0\n\
         for i in 1..steps { h rise v rise }",
        &[Some(3.0), None],
        None,
    )
    .unwrap();
    insta::assert_snapshot!(out, @"M0,0h10v10h10v10h10v10");
}

#[test]
fn bar_chart_from_arguments() {
    let source = "\
prop w (1..20) = 8, a, b, c;
def bar { prop x, height; M x,0 v height h w v 0 - height Z }
bar 0,a 10,b 20,c";
    let out = render(source, &[None, Some(5.0), Some(8.0), Some(3.0)], None).unwrap();
    insta::assert_snapshot!(out, @"M0,0v5h8v-5ZM10,0v8h8v-8ZM20,0v3h8v-3Z");
}

#[test]
fn zigzag_alternates_with_conditionals() {
    let source = "\
prop n (1..6) = 4;
M 0,0
for i in 1..n {
  if i % 2 = 1 { l 5,5 } else { l 5,-5 }
}";
    let out = render(source, &[None], None).unwrap();
    insta::assert_snapshot!(out, @"M0,0l5,5l5,-5l5,5l5,-5");
}

#[test]
fn countdown_marks_iterate_descending() {
    let out = render("for i in 3..1 { M i * 2, 0 v 1 }", &[], None).unwrap();
    insta::assert_snapshot!(out, @"M6,0v1M4,0v1M2,0v1");
}

#[test]
fn heart_uses_arc_chunking() {
    let source = "\
M 50,30
a 20,20 0 0,1 40,0
a 20,20 0 0,1 40,0
q 0,30,-40,60
q -40,-30,-40,-60
Z";
    let out = render(source, &[], None).unwrap();
    insta::assert_snapshot!(
        out,
        @"M50,30a20,20 0 0,1 40,0a20,20 0 0,1 40,0q0,30 -40,60q-40,-30 -40,-60Z"
    );
}

#[test]
fn dashes_via_import() {
    let mut lib = Library::new();
    lib.register("dash", "prop x, len = 4; M x,0 h len").unwrap();
    let out = render_with(
        &lib,
        "import 'dash' for i in 0..2 { dash i * 10, default }",
        &[],
        None,
    )
    .unwrap();
    insta::assert_snapshot!(out, @"M0,0h4M10,0h4M20,0h4");
}

#[test]
fn import_path_can_be_computed() {
    let mut lib = Library::new();
    lib.register("tick", "prop x; M x,0 v 2").unwrap();
    let out = render_with(&lib, "set which = 'tick' import which tick 3", &[], None).unwrap();
    assert_eq!(out, "M3,0v2");
}

#[test]
fn imports_compose_through_defs() {
    let mut lib = Library::new();
    lib.register("tooth", "prop x; M x,0 l 2,4 l 2,-4").unwrap();
    let source = "\
import 'tooth'
def comb { prop count (1..8); for i in 0..count - 1 { tooth i * 4 } }
comb 3";
    let out = render_with(&lib, source, &[], None).unwrap();
    insta::assert_snapshot!(out, @"M0,0l2,4l2,-4M4,0l2,4l2,-4M8,0l2,4l2,-4");
}

#[test]
fn report_marks_the_failing_column() {
    let source = "M 0,0\nL 5,oops";
    let err = render(source, &[], None).unwrap_err();
    assert_eq!(err.position(), Some((2, 5)));
    let rendered = format!("{:?}", pathru::report(&err, source));
    assert!(rendered.contains("undefined variable: oops"), "{rendered}");
}
