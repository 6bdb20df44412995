// 集成测试公共模块
//
// 提供测试页面、可编排的翻译后端和设置构建辅助

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use markup5ever_rcdom::{Handle, RcDom};

use transcraft::parsers::html::{find_nodes, has_class, html_to_dom, text_content};
use transcraft::translation::constants::{BATCH_SEPARATOR, TRANSLATION_BLOCK_CLASS};
use transcraft::translation::{
    MemorySettingsStore, PageSession, Settings, TranslationBackend, TranslationError,
    TranslationRequest, TranslationResult,
};

/// 测试 HTML 构建辅助
pub struct HtmlTestHelper;

impl HtmlTestHelper {
    /// 三个可翻译单元：一个标题、两个段落
    pub fn create_simple_english_page() -> String {
        r#"<!DOCTYPE html>
<html lang="en">
<head><title>Test Page</title><style>p { color: red; }</style></head>
<body>
    <h1>Welcome to the test page</h1>
    <p>This is the first paragraph of the article.</p>
    <p>Here is another paragraph with more words.</p>
</body>
</html>"#
            .to_string()
    }

    /// 指定数量的英文段落
    pub fn create_paragraph_page(count: usize) -> String {
        let paragraphs: String = (1..=count)
            .map(|i| format!("<p>Paragraph number {} talks about the weather today.</p>\n", i))
            .collect();
        format!(
            "<!DOCTYPE html><html lang=\"en\"><body>\n{}</body></html>",
            paragraphs
        )
    }

    /// 繁体中文页面
    pub fn create_traditional_chinese_page() -> String {
        let sentence = "這樣時間問題說話語國經濟發變學習開關繁體複雜們這樣時間問題說話語國經濟發變的";
        format!(
            r#"<!DOCTYPE html>
<html lang="zh-TW">
<body>
    <h1>{s}</h1>
    <p>{s}{s}</p>
    <p>{s}{s}{s}</p>
</body>
</html>"#,
            s = sentence
        )
    }

    /// 包含导航、脚本和表单的页面，只有正文段落应被选中
    pub fn create_page_with_chrome() -> String {
        r#"<!DOCTYPE html>
<html lang="en">
<body>
    <nav><a href="/">Home</a><p>Navigation paragraph should stay untouched.</p></nav>
    <script>var text = "not visible";</script>
    <form><button>Submit the form</button></form>
    <article>
        <p>The main story starts here with a long sentence.</p>
    </article>
</body>
</html>"#
            .to_string()
    }

    pub fn create_test_dom(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8").expect("Failed to parse test HTML")
    }
}

/// 测试设置
pub struct TestSettings;

impl TestSettings {
    /// 已配置 OpenAI Key 的默认设置
    pub fn default_settings() -> Settings {
        let mut settings = Settings::default();
        settings
            .api_keys
            .insert("openai".to_string(), "sk-test".to_string());
        settings
    }

    /// 每个批次只放指定数量的元素
    pub fn with_batch_elements(max_batch_elements: usize) -> Settings {
        let mut settings = Self::default_settings();
        settings.max_batch_elements = max_batch_elements;
        settings
    }

    pub fn store(settings: Settings) -> MemorySettingsStore {
        MemorySettingsStore::new(settings)
    }
}

/// 预设的单次回复
#[derive(Debug, Clone)]
pub enum Scripted {
    Fail(TranslationError),
    Reply(String),
}

/// 可编排的翻译后端
///
/// 默认把每段加上 `译:` 前缀后按原分隔符拼回；可以为第 N 次调用预设失败或回复。
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<HashMap<usize, Scripted>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<TranslationRequest>>,
}

impl ScriptedBackend {
    pub fn echo() -> Self {
        Self::default()
    }

    /// 第 `call` 次调用（从 0 开始）返回错误
    pub fn failing_on(self, call: usize, error: TranslationError) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(call, Scripted::Fail(error));
        self
    }

    /// 第 `call` 次调用返回固定文本
    pub fn replying_on(self, call: usize, reply: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(call, Scripted::Reply(reply.to_string()));
        self
    }

    /// 每次调用前等待
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TranslationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// 模拟模型：逐段加前缀并保留分隔符
pub fn echo_translation(text: &str) -> String {
    text.split(BATCH_SEPARATOR)
        .map(|segment| format!("译:{}", segment.trim()))
        .collect::<Vec<_>>()
        .join(BATCH_SEPARATOR)
}

#[async_trait]
impl TranslationBackend for ScriptedBackend {
    async fn translate(&self, request: &TranslationRequest) -> TranslationResult<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().unwrap().remove(&call);
        match scripted {
            Some(Scripted::Fail(error)) => Err(error),
            Some(Scripted::Reply(reply)) => Ok(reply),
            None => Ok(echo_translation(&request.text)),
        }
    }
}

/// 构造会话，同时返回后端句柄用于断言
pub fn create_session(
    html: &str,
    settings: Settings,
    backend: ScriptedBackend,
) -> (PageSession, Arc<ScriptedBackend>) {
    let backend = Arc::new(backend);
    let dom = HtmlTestHelper::create_test_dom(html);
    let session = PageSession::new(dom, MemorySettingsStore::new(settings), backend.clone())
        .expect("Session should be created from valid settings");
    (session, backend)
}

/// 断言辅助
pub struct AssertionHelper;

impl AssertionHelper {
    /// 文档中所有翻译节点
    pub fn translation_blocks(document: &Handle) -> Vec<Handle> {
        find_nodes(document, &["div"])
            .into_iter()
            .filter(|node| has_class(node, TRANSLATION_BLOCK_CLASS))
            .collect()
    }

    /// 所有翻译节点的文本
    pub fn translated_texts(document: &Handle) -> Vec<String> {
        Self::translation_blocks(document)
            .iter()
            .map(text_content)
            .collect()
    }

    pub fn assert_block_count(document: &Handle, expected: usize, context: &str) {
        let actual = Self::translation_blocks(document).len();
        assert_eq!(
            actual, expected,
            "{}: expected {} translation blocks, found {}",
            context, expected, actual
        );
    }
}
