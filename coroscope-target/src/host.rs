//! ホストが提供するデバッグ機能のインターフェース
//!
//! コルーチンのフレームウォーカーや型消去デコーダーは、シンボル解決と
//! 値アクセスをこのトレイト経由でのみ行います。実装はデバッガ側の責務です。

use crate::Result;
use regex::Regex;

/// アドレスを解決した結果のソース位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub function_name: String,
    pub file: String,
    pub line: u32,
}

/// 物理スタック上のフレーム
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalFrame {
    /// 最内フレームを0とするレベル
    pub level: usize,
    pub pc: u64,
    pub function_name: String,
}

/// テンプレート引数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateArgument<T> {
    /// 型引数
    Type(T),
    /// 整数値の非型引数
    Value(u64),
}

/// デバッグ情報プロバイダ
pub trait DebugInfoProvider {
    /// コードアドレスを関数名・ファイル・行に解決する
    ///
    /// デバッグ情報が存在しない場合は `TargetError::ResolutionError`。
    fn resolve(&self, address: u64) -> Result<SourceLocation>;

    /// 物理スタックを最内フレームから外側へ探索し、関数名が
    /// パターンにマッチする最初のフレームを返す
    fn find_matching_frame(&self, pattern: &Regex) -> Option<PhysicalFrame>;
}

/// 値アクセサ
///
/// 値と型はホストごとに表現が異なるため関連型で抽象化します。
/// すべての操作は読み取り専用で、ターゲットのメモリを書き換えてはいけません。
pub trait ValueAccessor {
    type Value: Clone + std::fmt::Debug;
    type Type: Clone + std::fmt::Debug;

    /// フレーム内の変数を読み取る
    fn frame_variable(&self, frame: &PhysicalFrame, name: &str) -> Result<Self::Value>;

    /// 構造体のフィールドを読み取る
    fn read_field(&self, value: &Self::Value, name: &str) -> Result<Self::Value>;

    /// 値を別の型として再解釈する
    ///
    /// 境界チェックも型チェックも行わない。正しさは呼び出し側の責任であり、
    /// 生のポインタ再解釈はこの操作だけに閉じ込める。
    fn cast_as(&self, value: &Self::Value, ty: &Self::Type) -> Result<Self::Value>;

    /// ポインタをデリファレンスする
    ///
    /// 参照先が読めない場合は `TargetError::InvalidAddress`。
    fn dereference(&self, pointer: &Self::Value) -> Result<Self::Value>;

    /// 値のシンボル表現（関数ポインタのシンボル名など）をテキストにする
    fn format_symbolic(&self, value: &Self::Value) -> Result<String>;

    /// 整数またはポインタの値を読み取る
    fn read_u64(&self, value: &Self::Value) -> Result<u64>;

    /// 値が格納されているアドレス
    fn address_of(&self, value: &Self::Value) -> Result<u64>;

    /// メモリを持たない整数値を作る（キャストの元として使う）
    fn integer(&self, raw: u64) -> Self::Value;

    /// 値の型
    fn type_of(&self, value: &Self::Value) -> Self::Type;

    /// typedefを取り除いた型名
    fn type_name(&self, ty: &Self::Type) -> String;

    /// 型名から型を検索する
    ///
    /// 見つからない場合は `TargetError::UnknownType`。
    fn lookup_type(&self, name: &str) -> Result<Self::Type>;

    /// `ty` へのポインタ型
    fn pointer_to(&self, ty: &Self::Type) -> Self::Type;

    /// テンプレート引数を取得する
    fn template_argument(
        &self,
        ty: &Self::Type,
        index: usize,
    ) -> Result<TemplateArgument<Self::Type>>;
}

/// アドレスからシンボル情報を引く機能
///
/// スナップショットホストがアドレス解決を差し替えられるようにするための境界です。
pub trait Symbolizer {
    /// アドレスを含む関数のソース位置
    fn resolve(&self, address: u64) -> Result<SourceLocation>;

    /// アドレスにあるシンボルの表示名（デマングル済み）
    fn symbol_name(&self, address: u64) -> Option<String>;
}

impl<S: Symbolizer + ?Sized> Symbolizer for &S {
    fn resolve(&self, address: u64) -> Result<SourceLocation> {
        (**self).resolve(address)
    }

    fn symbol_name(&self, address: u64) -> Option<String> {
        (**self).symbol_name(address)
    }
}

impl<S: Symbolizer + ?Sized> Symbolizer for Box<S> {
    fn resolve(&self, address: u64) -> Result<SourceLocation> {
        (**self).resolve(address)
    }

    fn symbol_name(&self, address: u64) -> Option<String> {
        (**self).symbol_name(address)
    }
}
