//! 核心服务
//!
//! 外部服务接口（翻译服务、词典查询）以及把各组件绑定到文档上的页面会话。

pub mod gateway;
pub mod lookup;
pub mod session;

pub use gateway::{HttpGateway, TranslationGateway};
pub use lookup::{CachedLookup, RichDefinition, RichDefinitionLookup, StaticDefinitionLookup};
pub use session::PageSession;
