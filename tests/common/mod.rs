// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use lexiweave::immersion::config::{EngineConfig, ImmersionConfig};
use lexiweave::immersion::core::TranslationGateway;
use lexiweave::immersion::error::{ImmersionError, ImmersionResult};
use lexiweave::immersion::vocabulary::{MemoryVocabularyStore, VocabularyEntry};
use lexiweave::immersion::{PageSession, RcDomTree};

/// 模拟翻译服务的一次应答
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 按词典替换后返回请求文本
    Translate,
    /// 返回固定文本
    Text(String),
    /// 返回服务错误
    Fail(String),
}

/// 可编排应答的翻译服务
///
/// 默认把请求中的中文词按 `with_word` 注册的映射替换后原样返回，
/// 分隔符保持不变，因此句子数总能对齐。
#[derive(Default)]
pub struct MockGateway {
    script: RefCell<VecDeque<MockReply>>,
    words: Vec<(String, String)>,
    latency: Option<Duration>,
    requests: RefCell<Vec<String>>,
    request_times: RefCell<Vec<Instant>>,
    in_flight: Cell<usize>,
    max_in_flight: Cell<usize>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_word(mut self, chinese: &str, english: &str) -> Self {
        self.words.push((chinese.to_string(), english.to_string()));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push_reply(&self, reply: MockReply) {
        self.script.borrow_mut().push_back(reply);
    }

    pub fn fail_next(&self, times: usize) {
        for _ in 0..times {
            self.push_reply(MockReply::Fail("503 Service Unavailable".to_string()));
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    pub fn request_times(&self) -> Vec<Instant> {
        self.request_times.borrow().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.get()
    }

    fn translate_words(&self, text: &str) -> String {
        self.words
            .iter()
            .fold(text.to_string(), |acc, (zh, en)| acc.replace(zh.as_str(), en))
    }
}

#[async_trait(?Send)]
impl TranslationGateway for MockGateway {
    async fn translate(
        &self,
        _engine: &EngineConfig,
        text: &str,
        _target_lang: &str,
    ) -> ImmersionResult<String> {
        self.requests.borrow_mut().push(text.to_string());
        self.request_times.borrow_mut().push(Instant::now());
        self.in_flight.set(self.in_flight.get() + 1);
        self.max_in_flight
            .set(self.max_in_flight.get().max(self.in_flight.get()));

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let reply = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or(MockReply::Translate);
        self.in_flight.set(self.in_flight.get() - 1);

        match reply {
            MockReply::Translate => Ok(self.translate_words(text)),
            MockReply::Text(text) => Ok(text),
            MockReply::Fail(message) => Err(ImmersionError::Provider(message)),
        }
    }
}

/// HTML 测试辅助工具
pub struct HtmlTestHelper;

impl HtmlTestHelper {
    pub fn tree(html: &str) -> Rc<RcDomTree> {
        Rc::new(RcDomTree::parse(html).expect("HTML should parse"))
    }

    /// 每个段落一个块的简单页面
    pub fn paragraphs(texts: &[&str]) -> String {
        let body: String = texts.iter().map(|t| format!("<p>{}</p>", t)).collect();
        format!("<html><head><title>测试</title></head><body>{}</body></html>", body)
    }

    /// 带导航、页脚、代码块的新闻页面
    pub fn news_page() -> String {
        r#"<html>
<head><title>新闻</title><script>var x = "脚本中的中文";</script></head>
<body>
  <nav><a href="/">首页</a> | <a href="/news">新闻</a></nav>
  <header><h1>今日新闻</h1></header>
  <main>
    <article>
      <h2>科技公司发布新产品</h2>
      <div class="content">
        <p>这家公司今天发布了新的手机。价格比去年便宜。</p>
        <p>很多用户表示<b>非常</b>满意。</p>
      </div>
      <pre><code>let 变量 = 1;</code></pre>
      <p>English paragraph without Chinese.</p>
      <div class="crumbs">首页 / 科技 / 手机</div>
    </article>
  </main>
  <footer>版权所有</footer>
</body>
</html>"#
            .to_string()
    }
}

/// 测试数据生成器
pub struct TestDataGenerator;

impl TestDataGenerator {
    pub fn fruit_vocabulary() -> Vec<VocabularyEntry> {
        vec![
            VocabularyEntry::new("apple", "apple", "苹果").with_inflections(["apples"]),
            VocabularyEntry::new("banana", "banana", "香蕉").with_inflections(["bananas"]),
            VocabularyEntry::new("like", "like", "喜欢;喜爱").with_inflections(["likes", "liked"]),
        ]
    }

    pub fn store(entries: Vec<VocabularyEntry>) -> MemoryVocabularyStore {
        MemoryVocabularyStore::new(entries).expect("vocabulary should be valid")
    }

    /// 不等待首次扫描的配置
    pub fn fast_config() -> ImmersionConfig {
        let mut config = ImmersionConfig::default();
        config.scan.initial_delay_ms = 0;
        config
    }
}

/// 测试环境：文档、模拟服务和会话
pub struct TestEnvironment {
    pub tree: Rc<RcDomTree>,
    pub gateway: Rc<MockGateway>,
    pub store: MemoryVocabularyStore,
    pub session: PageSession<RcDomTree>,
}

impl TestEnvironment {
    /// 必须在 LocalSet 中调用
    pub fn new(html: &str, gateway: MockGateway, vocabulary: Vec<VocabularyEntry>) -> Self {
        Self::with_config(html, gateway, vocabulary, TestDataGenerator::fast_config())
    }

    pub fn with_config(
        html: &str,
        gateway: MockGateway,
        vocabulary: Vec<VocabularyEntry>,
        config: ImmersionConfig,
    ) -> Self {
        let tree = HtmlTestHelper::tree(html);
        let gateway = Rc::new(gateway);
        let store = TestDataGenerator::store(vocabulary);
        let session = PageSession::new(tree.clone(), config, gateway.clone(), &store, None)
            .expect("session should start");

        Self {
            tree,
            gateway,
            store,
            session,
        }
    }

    pub fn html(&self) -> String {
        self.tree.to_html().expect("document should serialize")
    }
}
