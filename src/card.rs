// 该文件是 CardScan 项目的一部分。
// src/card.rs - 牌面代码与显示名称
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

//! 牌面代码由点数前缀加花色字母组成，例如 `AH`、`10S`、`QD`。
//! 无法识别的代码原样透传，从不报错。

/// 点数代码与名称
pub const RANKS: [(&str, &str); 13] = [
  ("A", "Ace"),
  ("2", "2"),
  ("3", "3"),
  ("4", "4"),
  ("5", "5"),
  ("6", "6"),
  ("7", "7"),
  ("8", "8"),
  ("9", "9"),
  ("10", "10"),
  ("J", "Jack"),
  ("Q", "Queen"),
  ("K", "King"),
];

/// 未识别牌面使用的符号
pub const UNKNOWN_CARD_SYMBOL: &str = "🃏";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suit {
  Hearts,
  Diamonds,
  Spades,
  Clubs,
}

impl Suit {
  /// 花色字母，不区分大小写
  pub fn from_letter(letter: char) -> Option<Self> {
    Self::from_exact_letter(letter.to_ascii_uppercase())
  }

  /// 只接受大写花色字母
  pub fn from_exact_letter(letter: char) -> Option<Self> {
    match letter {
      'H' => Some(Suit::Hearts),
      'D' => Some(Suit::Diamonds),
      'S' => Some(Suit::Spades),
      'C' => Some(Suit::Clubs),
      _ => None,
    }
  }

  pub fn name(&self) -> &'static str {
    match self {
      Suit::Hearts => "Hearts",
      Suit::Diamonds => "Diamonds",
      Suit::Spades => "Spades",
      Suit::Clubs => "Clubs",
    }
  }

  pub fn symbol(&self) -> &'static str {
    match self {
      Suit::Hearts => "♥️",
      Suit::Diamonds => "♦️",
      Suit::Spades => "♠️",
      Suit::Clubs => "♣️",
    }
  }

  /// 花色的小写族名，用于报表分组
  pub fn family(&self) -> &'static str {
    match self {
      Suit::Hearts => "hearts",
      Suit::Diamonds => "diamonds",
      Suit::Spades => "spades",
      Suit::Clubs => "clubs",
    }
  }
}

pub fn rank_name(rank: &str) -> Option<&'static str> {
  RANKS
    .iter()
    .find(|(code, _)| *code == rank)
    .map(|(_, name)| *name)
}

/// 拆分为 (点数前缀, 花色)；花色字母不可识别或代码过短时返回 `None`
fn split_code(code: &str, parse_suit: fn(char) -> Option<Suit>) -> Option<(&str, Suit)> {
  let last = code.chars().last()?;
  if code.chars().count() < 2 {
    return None;
  }
  let suit = parse_suit(last)?;
  Some((&code[..code.len() - last.len_utf8()], suit))
}

/// 牌面代码的花色（最后一个字符）
pub fn suit_of(code: &str) -> Option<Suit> {
  split_code(code, Suit::from_letter).map(|(_, suit)| suit)
}

/// 报表中的花色族名；花色不可识别时归入 `clubs`
pub fn suit_family(code: &str) -> &'static str {
  suit_of(code).map_or(Suit::Clubs.family(), |suit| suit.family())
}

/// 完整显示名称，例如 `"♥️ Ace of Hearts"`；未知代码返回 `"🃏 <code>"`
pub fn full_name(code: &str) -> String {
  if let Some((rank, suit)) = split_code(code, Suit::from_letter)
    && let Some(rank) = rank_name(rank)
  {
    return format!("{} {} of {}", suit.symbol(), rank, suit.name());
  }
  format!("{} {}", UNKNOWN_CARD_SYMBOL, code)
}

/// 叠加层标签使用的名称（不含花色符号）。
///
/// 花色字母区分大小写。花色可识别但点数未知时保留原始点数前缀；
/// 花色不可识别时返回原始代码。
pub fn label_name(code: &str) -> String {
  match split_code(code, Suit::from_exact_letter) {
    Some((rank, suit)) => {
      let rank = rank_name(rank).unwrap_or(rank);
      format!("{} of {}", rank, suit.name())
    }
    None => code.to_string(),
  }
}
