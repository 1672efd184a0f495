//! 型消去ラッパー（`any_executor`）のデコーダー
//!
//! ラッパーは保持している型を実行時のタグとしては持っていません。代わりに
//! 関数テーブルへのポインタ `target_fns_` を持ち、そのテーブルはコンパイラが
//! 保持型ごとに生成した関数ローカルな静的変数です。テーブルのシンボル名を
//! 既知のパターンと照合することで保持型の名前を取り出し、`target_` の
//! ストレージをその型として読みます。

use crate::Result;
use coroscope_target::{TargetError, ValueAccessor, ValueAccessorExt};
use regex::Regex;
use tracing::{debug, warn};

/// 保持型ごとに生成される関数テーブルのシンボル名パターン（照合する順）
///
/// キャプチャ1が保持型の名前。
pub const TARGET_TABLE_PATTERNS: [&str; 2] = [
    r"^<(?:boost::)*asio::execution::detail::any_executor_base::target_fns_table<(.*?) *>\(bool, std::enable_if<!std::is_same<.*>::value, void>::type\*\)::fns_with_execute>$",
    r"^<(?:boost::)*asio::execution::detail::any_executor_base::target_fns_table<(.*?) *>\(bool, std::enable_if<!std::is_same<.*>::value, void>::type\*\)::fns_with_blocking_execute>$",
];

/// テンプレート引数の整数リテラルに付く接尾辞（`0ul` など）
const INTEGER_SUFFIX_PATTERN: &str = r"(\b[0-9]+)ul*\b";

/// デコード設定
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// 保持型の名前から整数リテラルの接尾辞を取り除く
    pub strip_integer_suffixes: bool,
    /// 組み込みのパターンの後に照合する追加パターン
    pub extra_table_patterns: Vec<String>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            strip_integer_suffixes: true,
            extra_table_patterns: Vec::new(),
        }
    }
}

/// 保持対象の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// 関数テーブルがヌル（何も保持していない）
    Empty,
    /// 保持型と値を取り出せた
    Resolved,
    /// テーブルのシンボルがどのパターンにもマッチしない
    UnknownTarget,
    /// 保持型の名前はわかったが、その型がバイナリにない
    UnresolvedType,
    /// ラッパーまたはストレージのメモリが読めない
    Unreadable,
}

/// 型消去ラッパーをデコードした結果
#[derive(Debug, Clone)]
pub struct TypeErasedObject<V> {
    /// ラッパー自身の型名（typedef除去済み）
    pub static_type: String,
    /// 保持型の名前
    pub target_type: Option<String>,
    /// 保持している値
    pub target_value: Option<V>,
    pub state: TargetState,
}

impl<V> TypeErasedObject<V> {
    fn new(static_type: String, state: TargetState) -> Self {
        Self {
            static_type,
            target_type: None,
            target_value: None,
            state,
        }
    }

    /// 何も保持していないか
    pub fn is_empty(&self) -> bool {
        self.state == TargetState::Empty
    }
}

/// 型消去デコーダー
#[derive(Debug, Clone)]
pub struct TypeErasureDecoder {
    catalogue: Vec<Regex>,
    integer_suffix: Regex,
    table_field: String,
    storage_field: String,
    config: DecodeConfig,
}

impl TypeErasureDecoder {
    /// asio の `any_executor` 用のデコーダーを作成する
    pub fn new(config: DecodeConfig) -> Result<Self> {
        let catalogue = TARGET_TABLE_PATTERNS
            .iter()
            .map(|pattern| Regex::new(pattern))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut decoder = Self {
            catalogue,
            integer_suffix: Regex::new(INTEGER_SUFFIX_PATTERN)?,
            table_field: "target_fns_".to_string(),
            storage_field: "target_".to_string(),
            config,
        };
        for pattern in decoder.config.extra_table_patterns.clone() {
            decoder.add_pattern(&pattern)?;
        }
        Ok(decoder)
    }

    /// パターンを末尾に追加する（キャプチャ1が保持型の名前）
    pub fn add_pattern(&mut self, pattern: &str) -> Result<&mut Self> {
        self.catalogue.push(Regex::new(pattern)?);
        Ok(self)
    }

    /// テーブルのシンボル表現から保持型の名前を取り出す
    ///
    /// どのパターンにもマッチしなければ None。
    pub fn target_type_name(&self, table_symbol: &str) -> Option<String> {
        let captured = self
            .catalogue
            .iter()
            .find_map(|re| re.captures(table_symbol))
            .and_then(|caps| caps.get(1))?
            .as_str()
            .trim();
        Some(self.normalize(captured))
    }

    /// 型名を型システムで引ける形に正規化する
    pub fn normalize(&self, type_name: &str) -> String {
        if self.config.strip_integer_suffixes {
            self.integer_suffix.replace_all(type_name, "${1}").into_owned()
        } else {
            type_name.to_string()
        }
    }

    /// ラッパーをデコードする
    ///
    /// 失敗してもエラーにはせず、`TargetState` で理由を返します。
    pub fn decode<H: ValueAccessor>(&self, host: &H, wrapper: &H::Value) -> TypeErasedObject<H::Value> {
        let static_type = host.type_name(&host.type_of(wrapper));

        let table = match host.read_field(wrapper, &self.table_field) {
            Ok(table) => table,
            Err(e) if e.is_field_not_found() => {
                debug!(wrapper = %static_type, "wrapper has no function table field");
                return TypeErasedObject::new(static_type, TargetState::Empty);
            }
            Err(e) => {
                warn!(wrapper = %static_type, error = %e, "cannot read function table");
                return TypeErasedObject::new(static_type, TargetState::Unreadable);
            }
        };

        match host.is_null(&table) {
            Ok(true) => return TypeErasedObject::new(static_type, TargetState::Empty),
            Ok(false) => {}
            Err(e) => {
                warn!(wrapper = %static_type, error = %e, "cannot read function table");
                return TypeErasedObject::new(static_type, TargetState::Unreadable);
            }
        }

        let symbol = match host.format_symbolic(&table) {
            Ok(symbol) => symbol,
            Err(e) => {
                warn!(wrapper = %static_type, error = %e, "cannot symbolize function table");
                return TypeErasedObject::new(static_type, TargetState::Unreadable);
            }
        };

        let target_type = match self.target_type_name(&symbol) {
            Some(name) => name,
            None => {
                debug!(wrapper = %static_type, table = %symbol, "function table matches no known pattern");
                return TypeErasedObject::new(static_type, TargetState::UnknownTarget);
            }
        };

        let mut object = TypeErasedObject::new(static_type, TargetState::Resolved);
        match self.read_target(host, wrapper, &target_type) {
            Ok(value) => object.target_value = Some(value),
            Err(TargetError::UnknownType(name)) => {
                debug!(target = %name, "target type not present in the binary");
                object.state = TargetState::UnresolvedType;
            }
            Err(e) => {
                warn!(target = %target_type, error = %e, "cannot read target storage");
                object.state = TargetState::Unreadable;
            }
        }
        object.target_type = Some(target_type);
        object
    }

    /// ストレージを保持型として読む
    fn read_target<H: ValueAccessor>(
        &self,
        host: &H,
        wrapper: &H::Value,
        target_type: &str,
    ) -> coroscope_target::Result<H::Value> {
        let ty = host.lookup_type(target_type)?;
        let storage = host.read_field(wrapper, &self.storage_field)?;
        host.deref_as(&storage, &ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_symbol(target: &str, blocking: bool) -> String {
        format!(
            "<asio::execution::detail::any_executor_base::target_fns_table<{}>(bool, \
             std::enable_if<!std::is_same<{}, void>::value, void>::type*)::fns_with_{}execute>",
            target,
            target,
            if blocking { "blocking_" } else { "" }
        )
    }

    #[test]
    fn test_target_type_name() {
        let decoder = TypeErasureDecoder::new(DecodeConfig::default()).unwrap();

        let symbol = table_symbol("asio::io_context::basic_executor_type<std::allocator<void>, 0ul> ", false);
        assert_eq!(
            decoder.target_type_name(&symbol).as_deref(),
            Some("asio::io_context::basic_executor_type<std::allocator<void>, 0>")
        );

        let symbol = table_symbol("my::strand", true);
        assert_eq!(decoder.target_type_name(&symbol).as_deref(), Some("my::strand"));
    }

    #[test]
    fn test_boost_prefix() {
        let decoder = TypeErasureDecoder::new(DecodeConfig::default()).unwrap();
        let symbol = table_symbol("boost::asio::thread_pool::basic_executor_type<std::allocator<void>, 4ul>", false)
            .replacen("<asio::", "<boost::asio::", 1);
        assert_eq!(
            decoder.target_type_name(&symbol).as_deref(),
            Some("boost::asio::thread_pool::basic_executor_type<std::allocator<void>, 4>")
        );
    }

    #[test]
    fn test_pattern_mismatch() {
        let decoder = TypeErasureDecoder::new(DecodeConfig::default()).unwrap();
        assert_eq!(decoder.target_type_name("<vtable for my::executor>"), None);
        assert_eq!(decoder.target_type_name("0x4010"), None);
    }

    #[test]
    fn test_extra_pattern_is_tried_last() {
        let mut decoder = TypeErasureDecoder::new(DecodeConfig {
            extra_table_patterns: vec![r"^<my::erased_fns<(.*)>::table>$".to_string()],
            ..DecodeConfig::default()
        })
        .unwrap();
        assert_eq!(
            decoder.target_type_name("<my::erased_fns<my::pool<8ul>>::table>").as_deref(),
            Some("my::pool<8>")
        );

        decoder.add_pattern(r"^<(.*)>$").unwrap();
        assert_eq!(decoder.target_type_name("<my::strand>").as_deref(), Some("my::strand"));
        // 組み込みのパターンが優先される
        let symbol = table_symbol("my::strand", false);
        assert_eq!(decoder.target_type_name(&symbol).as_deref(), Some("my::strand"));

        assert!(decoder.add_pattern("(").is_err());
    }

    #[test]
    fn test_normalize() {
        let decoder = TypeErasureDecoder::new(DecodeConfig::default()).unwrap();
        assert_eq!(decoder.normalize("pool<16ul, 2u, 7>"), "pool<16, 2, 7>");
        // 識別子の一部は対象外
        assert_eq!(decoder.normalize("block_2ul_t"), "block_2ul_t");

        let keep = TypeErasureDecoder::new(DecodeConfig {
            strip_integer_suffixes: false,
            ..DecodeConfig::default()
        })
        .unwrap();
        assert_eq!(keep.normalize("pool<16ul>"), "pool<16ul>");
    }
}
