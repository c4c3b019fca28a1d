//! Integration tests for the chunkxml parser

use chunkxml_core::{
    parse, parse_with_recovery, ErrorClass, NodeData, ParseErrorKind, Parser, TagForm,
};

fn keys(doc: &chunkxml_core::Document, ids: impl Iterator<Item = chunkxml_core::NodeId>) -> Vec<String> {
    ids.map(|id| match &doc[id].data {
        NodeData::Tag(tag) => tag.key.clone(),
        NodeData::Text(text) => format!("#{}", text),
    })
    .collect()
}

// ============================================================================
// Structure Tests
// ============================================================================

#[test]
fn test_parse_nested_elements() {
    let doc = parse(b"<a><b>hi</b><b>bye</b></a>").unwrap();
    let root = doc.root().unwrap();

    assert_eq!(doc[root].key(), Some("a"));
    assert_eq!(doc[root].parent(), None);
    assert_eq!(keys(&doc, doc.children(root)), ["b", "b"]);

    let first = doc[root].first_child().unwrap();
    assert_eq!(keys(&doc, doc.children(first)), ["#hi"]);
    assert_eq!(doc[first].parent(), Some(root));
    assert_eq!(doc[root].last_child(), doc[first].next());
}

#[test]
fn test_parse_attributes_in_order() {
    let doc = parse(br#"<a x="1" y="2"/>"#).unwrap();
    let root = doc.root().unwrap();
    let element = &doc[root];

    let attrs: Vec<_> = element
        .attributes()
        .iter()
        .map(|a| (a.key.as_str(), a.value.as_str()))
        .collect();
    assert_eq!(attrs, [("x", "1"), ("y", "2")]);
    assert_eq!(element.first_child(), None);
    assert_eq!(element.tag().unwrap().form, TagForm::SelfClosing);
}

#[test]
fn test_parse_prolog_and_comment() {
    let doc = parse(br#"<?xml version="1.0"?><!-- note --><a/>"#).unwrap();
    let top: Vec<_> = doc.top_level().collect();
    assert_eq!(keys(&doc, top.iter().copied()), ["?xml", "!--", "a"]);

    for id in &top {
        assert_eq!(doc[*id].first_child(), None);
    }

    let decl = doc[top[0]].tag().unwrap();
    assert_eq!(decl.form, TagForm::Passthrough);
    assert_eq!(doc[top[0]].attribute("version"), Some("1.0"));

    let comment = doc[top[1]].tag().unwrap();
    assert_eq!(comment.form, TagForm::Passthrough);
    assert_eq!(comment.body.as_deref(), Some(" note "));

    assert_eq!(doc[top[2]].tag().unwrap().form, TagForm::SelfClosing);
    assert_eq!(doc.root(), Some(top[0]));
}

#[test]
fn test_parse_doctype_with_internal_subset() {
    let input = b"<!DOCTYPE note [<!ELEMENT note (#PCDATA)>]><note>x</note>";
    let doc = parse(input).unwrap();
    let top: Vec<_> = doc.top_level().collect();

    assert_eq!(keys(&doc, top.iter().copied()), ["!DOCTYPE", "note"]);
    let doctype = doc[top[0]].tag().unwrap();
    assert_eq!(doctype.body.as_deref(), Some("note [<!ELEMENT note (#PCDATA)>]"));
}

#[test]
fn test_comment_may_contain_gt() {
    let doc = parse(b"<a><!-- a > b -- c --></a>").unwrap();
    let root = doc.root().unwrap();
    let comment = doc[root].first_child().unwrap();
    assert_eq!(doc[comment].key(), Some("!--"));
    assert_eq!(doc[comment].tag().unwrap().body.as_deref(), Some(" a > b -- c "));
    assert_eq!(doc[comment].next(), None);
}

#[test]
fn test_cdata_merges_with_text() {
    let doc = parse(b"<a>x<![CDATA[<y> & ]]>z</a>").unwrap();
    let root = doc.root().unwrap();
    assert_eq!(keys(&doc, doc.children(root)), ["#x<y> & z"]);
}

#[test]
fn test_text_split_by_element_stays_separate() {
    let doc = parse(b"<p>one<br/>two</p>").unwrap();
    let root = doc.root().unwrap();
    assert_eq!(keys(&doc, doc.children(root)), ["#one", "br", "#two"]);
}

#[test]
fn test_attribute_quote_styles() {
    let doc = parse(b"<a one='1' two=\"two words\" three=3 four>x</a>").unwrap();
    let root = doc.root().unwrap();
    let element = &doc[root];

    assert_eq!(element.attribute("one"), Some("1"));
    assert_eq!(element.attribute("two"), Some("two words"));
    assert_eq!(element.attribute("three"), Some("3"));
    assert_eq!(element.attribute("four"), Some(""));
    assert_eq!(element.attributes().len(), 4);
}

#[test]
fn test_attribute_whitespace_around_equals() {
    let doc = parse(b"<a  x = \"1\"\n\ty\t=\t'2' ></a>").unwrap();
    let root = doc.root().unwrap();
    assert_eq!(doc[root].attribute("x"), Some("1"));
    assert_eq!(doc[root].attribute("y"), Some("2"));
}

#[test]
fn test_duplicate_attributes_kept() {
    let doc = parse(br#"<a k="first" k="second"/>"#).unwrap();
    let root = doc.root().unwrap();
    assert_eq!(doc[root].attributes().len(), 2);
    assert_eq!(doc[root].attribute("k"), Some("first"));
}

#[test]
fn test_entities_kept_verbatim() {
    let doc = parse(b"<a t=\"&amp;\">&lt;b&gt;</a>").unwrap();
    let root = doc.root().unwrap();
    assert_eq!(doc[root].attribute("t"), Some("&amp;"));
    assert_eq!(doc.content(root).as_deref(), Some("&lt;b&gt;"));
}

#[test]
fn test_close_tag_trailing_space() {
    let doc = parse(b"<a>x</a >").unwrap();
    assert!(doc.root().is_some());
}

#[test]
fn test_whitespace_text_kept_by_default() {
    let input = b"<a>\n  <b>x</b>\n</a>";
    let doc = parse(input).unwrap();
    let root = doc.root().unwrap();
    assert_eq!(keys(&doc, doc.children(root)), ["#\n  ", "b", "#\n"]);

    let mut parser = Parser::new().with_whitespace_text(false);
    parser.feed(input).unwrap();
    let doc = parser.finish().unwrap();
    let root = doc.root().unwrap();
    assert_eq!(keys(&doc, doc.children(root)), ["b"]);
}

#[test]
fn test_top_level_text_discarded() {
    let doc = parse(b"  leading <a>x</a>\ntrailing").unwrap();
    assert_eq!(doc.len(), 2);
    assert_eq!(doc.top_level().count(), 1);
}

#[test]
fn test_key_value_exclusive() {
    let doc = parse(br#"<?xml version="1.0"?><r a="1">t<s/>u<!--c--><![CDATA[v]]></r>"#).unwrap();
    let root = doc.root().unwrap();
    for id in doc.top_level().flat_map(|top| doc.descendants(top)) {
        let element = &doc[id];
        assert!(element.key().is_some() != element.value().is_some());
    }
    assert!(doc.descendants(root).count() >= 1);
}

// ============================================================================
// Failure Tests
// ============================================================================

#[test]
fn test_mismatched_close_tag() {
    let result = parse_with_recovery(b"<a><b></a>");
    let error = result.error.clone().unwrap();
    assert_eq!(error.kind, ParseErrorKind::MismatchedTag);
    assert_eq!(error.class(), ErrorClass::Malformed);

    let doc = result.document;
    assert_eq!(doc.len(), 2);
    let released = doc.free();
    assert_eq!(released.elements, 2);
}

#[test]
fn test_mismatched_close_tag_span() {
    let error = parse(b"<a></b>").unwrap_err();
    let span = error.span.unwrap();
    assert_eq!((span.start, span.end), (3, 7));
    assert_eq!(error.to_string(), "expected </a>, found </b> at bytes 3..7");
}

#[test]
fn test_unexpected_close_tag() {
    let error = parse(b"</a>").unwrap_err();
    assert_eq!(error.kind, ParseErrorKind::UnexpectedCloseTag);
}

#[test]
fn test_unterminated_tag() {
    let result = parse_with_recovery(b"<a><b");
    assert_eq!(result.error.as_ref().unwrap().kind, ParseErrorKind::UnexpectedEof);
    assert_eq!(result.document.len(), 1);
}

#[test]
fn test_unterminated_attribute_value() {
    let result = parse_with_recovery(b"<a x=\"1");
    assert_eq!(
        result.error.as_ref().unwrap().kind,
        ParseErrorKind::UnclosedDelimiter
    );
    let doc = result.document;
    let root = doc.root().unwrap();
    assert!(doc[root].attributes().is_empty());
    assert_eq!(doc.free().elements, 1);
}

#[test]
fn test_unterminated_comment() {
    let error = parse(b"<a><!-- never closed").unwrap_err();
    assert_eq!(error.kind, ParseErrorKind::UnclosedDelimiter);
}

#[test]
fn test_unclosed_element() {
    let result = parse_with_recovery(b"<a><b/>text");
    assert_eq!(
        result.error.as_ref().unwrap().kind,
        ParseErrorKind::UnclosedElement
    );
    let doc = result.document;
    let root = doc.root().unwrap();
    assert_eq!(keys(&doc, doc.children(root)), ["b", "#text"]);
}

#[test]
fn test_empty_input() {
    let inputs: [&[u8]; 2] = [b"", b"   \n\t"];
    for input in inputs {
        let error = parse(input).unwrap_err();
        assert_eq!(error.kind, ParseErrorKind::EmptyInput);
        assert_eq!(error.class(), ErrorClass::EmptyInput);
    }
}

#[test]
fn test_no_root_element() {
    let error = parse(b"just some text").unwrap_err();
    assert_eq!(error.kind, ParseErrorKind::NoRootElement);
    assert_eq!(error.class(), ErrorClass::Malformed);
}

#[test]
fn test_invalid_tag_syntax() {
    let inputs: [&[u8]; 6] = [b"<>", b"< a>", b"<a <b>", b"<a x=>", b"<a/ >", b"<!>"];
    for input in inputs {
        let error = parse(input).unwrap_err();
        assert_eq!(
            error.kind,
            ParseErrorKind::InvalidSyntax,
            "input: {:?}",
            String::from_utf8_lossy(input)
        );
    }
}

#[test]
fn test_invalid_utf8_text() {
    let error = parse(b"<a>\xff\xfe</a>").unwrap_err();
    assert_eq!(error.kind, ParseErrorKind::InvalidUtf8);
}

#[test]
fn test_depth_limit() {
    let mut parser = Parser::new().with_max_depth(2);
    let error = parser.feed(b"<a><b><c></c></b></a>").unwrap_err();
    assert_eq!(error.kind, ParseErrorKind::DepthLimitExceeded);

    let result = parser.finish_with_recovery();
    assert_eq!(result.document.len(), 3);
}

#[test]
fn test_failed_parser_stays_failed() {
    let mut parser = Parser::new();
    let first = parser.feed(b"<a></b>").unwrap_err();
    let second = parser.feed(b"<c/>").unwrap_err();
    assert_eq!(first, second);
    assert_eq!(parser.error(), Some(&first));
    assert_eq!(parser.finish().unwrap_err(), first);
}

#[test]
fn test_parser_exposes_progress() {
    let mut parser = Parser::new();
    assert_eq!(parser.root(), None);

    parser.feed(b"<a><b").unwrap();
    let root = parser.root().unwrap();
    assert_eq!(parser.current(), Some(root));
    assert_eq!(parser.offset(), 5);

    parser.feed(b">").unwrap();
    assert_ne!(parser.current(), Some(root));
    assert_eq!(parser.document().len(), 2);
}

// ============================================================================
// Release Tests
// ============================================================================

#[test]
fn test_free_counts_everything() {
    let doc = parse(br#"<?xml version="1.0"?><a x="1" y="2"><b z="3">t</b><!--c--></a>"#).unwrap();
    let total = doc.len();
    let released = doc.free();
    assert_eq!(released.elements, total);
    assert_eq!(released.attributes, 4);
}

#[test]
fn test_free_partial_tree_after_every_prefix() {
    let input = br#"<r k="v"><a>1</a><b x='y'>2<c/></b><!--z--></r>"#;
    for end in 0..input.len() {
        let mut parser = Parser::new();
        parser.feed(&input[..end]).unwrap();
        let result = parser.finish_with_recovery();
        let doc = result.document;
        let total = doc.len();
        assert_eq!(doc.free().elements, total, "prefix length {}", end);
    }
}
