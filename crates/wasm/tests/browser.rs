use eqmark_wasm::{EquationProcessor, install};
use js_sys::{Promise, Reflect};
use serde::Deserialize;
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[derive(Deserialize, Debug, PartialEq)]
struct Stats {
    inline: u32,
    display: u32,
    total: u32,
}

fn document() -> web_sys::Document {
    web_sys::window().unwrap().document().unwrap()
}

fn set_body(html: &str) {
    let body = document().body().unwrap();
    body.set_inner_html(html);
    body.set_class_name("");
}

fn stats(value: JsValue) -> Stats {
    serde_wasm_bindgen::from_value(value).expect("deserialize stats")
}

async fn next_tick() {
    JsFuture::from(Promise::resolve(&JsValue::NULL)).await.unwrap();
}

#[wasm_bindgen_test]
fn converts_markers_in_body() {
    set_body(r"<p>See MATHSTARTINLINE\(x+1\)MATHENDINLINE and MATHSTARTDISPLAY\[y=2x\]MATHENDDISPLAY.</p>");
    let processor = EquationProcessor::new(JsValue::UNDEFINED).unwrap();
    let result = stats(processor.process().unwrap());
    assert_eq!(
        result,
        Stats {
            inline: 1,
            display: 1,
            total: 2
        }
    );

    let span = document()
        .query_selector(".inlineMath")
        .unwrap()
        .expect("inline element");
    assert_eq!(span.tag_name(), "SPAN");
    assert_eq!(span.get_attribute("data-equation-id").as_deref(), Some("inline-1"));
    assert_eq!(span.text_content().as_deref(), Some(r"\(x+1\)"));
    assert!(document().get_element_by_id("equation-processor-styles").is_some());
}

#[wasm_bindgen_test]
fn malformed_prefix_is_left_in_place() {
    set_body(r"<p>MATHSTARTINLINE\(a\) MATHSTARTINLINE\(b\)MATHENDINLINE</p>");
    let processor = EquationProcessor::new(JsValue::UNDEFINED).unwrap();
    assert_eq!(stats(processor.process().unwrap()).inline, 1);
    let text = document().body().unwrap().text_content().unwrap();
    assert!(text.starts_with(r"MATHSTARTINLINE\(a\) "));
}

#[wasm_bindgen_test]
fn form_fields_are_left_alone() {
    set_body(r"<textarea>MATHSTARTINLINE\(x\)MATHENDINLINE</textarea><p>MATHSTARTINLINE\(y\)MATHENDINLINE</p>");
    let processor = EquationProcessor::new(JsValue::UNDEFINED).unwrap();
    assert_eq!(stats(processor.process().unwrap()).inline, 1);
    let textarea = document().query_selector("textarea").unwrap().unwrap();
    assert_eq!(textarea.child_element_count(), 0);
    assert_eq!(textarea.text_content().as_deref(), Some(r"MATHSTARTINLINE\(x\)MATHENDINLINE"));
}

#[wasm_bindgen_test]
fn get_stats_reports_live_elements() {
    set_body(r"<p>MATHSTARTDISPLAY\[a\]MATHENDDISPLAY MATHSTARTDISPLAY\[b\]MATHENDDISPLAY</p>");
    let processor = EquationProcessor::new(JsValue::UNDEFINED).unwrap();
    processor.process().unwrap();
    document().query_selector(".Math_box").unwrap().unwrap().remove();

    let live = processor.get_stats().unwrap();
    let total = Reflect::get(&live, &JsValue::from_str("total")).unwrap();
    assert_eq!(total.as_f64(), Some(1.0));
    let elements = Reflect::get(&live, &JsValue::from_str("elements")).unwrap();
    let display: js_sys::Array = Reflect::get(&elements, &JsValue::from_str("display"))
        .unwrap()
        .into();
    assert_eq!(display.length(), 1);
}

#[wasm_bindgen_test]
fn debug_mode_toggles_body_class() {
    set_body("<p>x</p>");
    let processor = EquationProcessor::new(JsValue::UNDEFINED).unwrap();
    processor.enable_debug().unwrap();
    let body = document().body().unwrap();
    assert!(body.class_list().contains("debug-equations"));
    processor.disable_debug().unwrap();
    assert!(!body.class_list().contains("debug-equations"));
}

#[wasm_bindgen_test]
async fn watcher_reprocesses_inserted_content_once() {
    set_body(r"<p>MATHSTARTINLINE\(a\)MATHENDINLINE</p>");
    let processor = EquationProcessor::new(JsValue::UNDEFINED).unwrap();
    processor.process().unwrap();
    assert!(processor.watch_for_changes().unwrap());
    assert!(!processor.watch_for_changes().unwrap());

    let late = document().create_element("div").unwrap();
    late.set_inner_html(r"MATHSTARTINLINE\(b\)MATHENDINLINE");
    document().body().unwrap().append_child(&late).unwrap();
    next_tick().await;
    next_tick().await;

    assert_eq!(processor.passes(), 2.0);
    let converted = late.query_selector(".inlineMath").unwrap().expect("converted");
    assert_eq!(converted.get_attribute("data-equation-id").as_deref(), Some("inline-1"));
}

#[wasm_bindgen_test]
fn install_publishes_global() {
    set_body("<p>plain</p>");
    let processor = install(JsValue::UNDEFINED).unwrap();
    let window = web_sys::window().unwrap();
    let global = Reflect::get(&window, &JsValue::from_str("EquationProcessor")).unwrap();
    assert!(global.is_object());
    assert_eq!(processor.version(), "1.0.0");
    assert_eq!(processor.passes(), 1.0);
}

#[wasm_bindgen_test]
fn rejects_invalid_config() {
    let options = serde_wasm_bindgen::to_value(&bad_options()).unwrap();
    assert!(EquationProcessor::new(options).is_err());
}

#[derive(serde::Serialize)]
struct BadOptions {
    config: BadConfig,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct BadConfig {
    inline_class: &'static str,
}

fn bad_options() -> BadOptions {
    BadOptions {
        config: BadConfig {
            inline_class: "not valid",
        },
    }
}
