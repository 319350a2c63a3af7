//! Positionale Parameter
//!
//! Jede Methode deklariert ein Schema aus `ParamTyp`s. Der Dispatcher prueft
//! die empfangene Parameterliste gegen das Schema bevor der Handler laeuft;
//! die Zugriffsmethoden von `Params` dekodieren danach die einzelnen Werte.

use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// Erwarteter Typ eines positionalen Parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamTyp {
    /// JSON-Zahl (Ganzzahl oder Gleitkomma, wird abgeschnitten)
    Zahl,
    /// JSON-Boolean
    Wahrheitswert,
    /// JSON-String
    Text,
    /// JSON-String, `null` oder fehlend (nur am Ende der Liste)
    OptionalerText,
}

impl ParamTyp {
    /// Prueft ob ein Wert zu diesem Typ passt
    pub fn passt(&self, wert: &Value) -> bool {
        match self {
            Self::Zahl => wert.is_number(),
            Self::Wahrheitswert => wert.is_boolean(),
            Self::Text => wert.is_string(),
            Self::OptionalerText => wert.is_string() || wert.is_null(),
        }
    }

    fn ist_optional(&self) -> bool {
        matches!(self, Self::OptionalerText)
    }
}

/// Gepruefte positionale Parameterliste
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<Value>);

impl Params {
    /// Prueft `werte` gegen `schema`
    ///
    /// Optionale Parameter duerfen am Ende fehlen; ueberzaehlige Parameter
    /// werden abgelehnt.
    pub fn pruefen(werte: Vec<Value>, schema: &[ParamTyp]) -> ProtocolResult<Self> {
        let pflicht = schema
            .iter()
            .rposition(|t| !t.ist_optional())
            .map(|i| i + 1)
            .unwrap_or(0);

        if werte.len() < pflicht || werte.len() > schema.len() {
            return Err(ProtocolError::ParameterAnzahl {
                min: pflicht,
                max: schema.len(),
                erhalten: werte.len(),
            });
        }

        for (index, (wert, typ)) in werte.iter().zip(schema).enumerate() {
            if !typ.passt(wert) {
                return Err(ProtocolError::ParameterTyp {
                    index,
                    erwartet: *typ,
                });
            }
        }

        Ok(Self(werte))
    }

    /// Anzahl der empfangenen Parameter
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ganzzahl an Position `index`; Gleitkommazahlen werden abgeschnitten
    pub fn zahl(&self, index: usize) -> ProtocolResult<i64> {
        let wert = self.0.get(index);
        wert.and_then(|w| w.as_i64().or_else(|| w.as_f64().map(|f| f.trunc() as i64)))
            .ok_or(ProtocolError::ParameterTyp {
                index,
                erwartet: ParamTyp::Zahl,
            })
    }

    /// Ganzzahl an Position `index`, auf den i32-Bereich begrenzt
    pub fn zahl_i32(&self, index: usize) -> ProtocolResult<i32> {
        let wert = self.zahl(index)?;
        Ok(wert.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
    }

    /// Boolean an Position `index`
    pub fn wahrheitswert(&self, index: usize) -> ProtocolResult<bool> {
        self.0
            .get(index)
            .and_then(Value::as_bool)
            .ok_or(ProtocolError::ParameterTyp {
                index,
                erwartet: ParamTyp::Wahrheitswert,
            })
    }

    /// String an Position `index`
    pub fn text(&self, index: usize) -> ProtocolResult<&str> {
        self.0
            .get(index)
            .and_then(Value::as_str)
            .ok_or(ProtocolError::ParameterTyp {
                index,
                erwartet: ParamTyp::Text,
            })
    }

    /// Optionaler String an Position `index` (`null` oder fehlend = `None`)
    pub fn optionaler_text(&self, index: usize) -> ProtocolResult<Option<&str>> {
        match self.0.get(index) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(ProtocolError::ParameterTyp {
                index,
                erwartet: ParamTyp::OptionalerText,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
