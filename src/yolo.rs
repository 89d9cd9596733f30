//! YOLO label lines: `class x_center y_center width height` for boxes,
//! `class x1 y1 x2 y2 ...` for polygons. Values are normalized and never clamped.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum YoloLine {
    Rect {
        class_index: usize,
        x_center: f64,
        y_center: f64,
        width: f64,
        height: f64,
    },
    Polygon {
        class_index: usize,
        points: Vec<(f64, f64)>,
    },
}

impl YoloLine {
    pub fn class_index(&self) -> usize {
        match self {
            Self::Rect { class_index, .. } | Self::Polygon { class_index, .. } => *class_index,
        }
    }

    /// Parse a box line. Blank lines yield `Ok(None)`.
    pub fn parse_rect(line: &str) -> Result<Option<Self>, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(None);
        }
        if tokens.len() != 5 {
            return Err(format!("expected 5 values, found {}", tokens.len()));
        }
        let class_index = parse_class_index(tokens[0])?;
        let values = tokens[1..]
            .iter()
            .map(|token| parse_value(token))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Self::Rect {
            class_index,
            x_center: values[0],
            y_center: values[1],
            width: values[2],
            height: values[3],
        }))
    }

    /// Parse a polygon line. Blank lines yield `Ok(None)`.
    pub fn parse_polygon(line: &str) -> Result<Option<Self>, String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some((first, coords)) = tokens.split_first() else {
            return Ok(None);
        };
        let class_index = parse_class_index(first)?;
        if coords.is_empty() || coords.len() % 2 != 0 {
            return Err(format!(
                "expected an even, non-zero number of coordinates, found {}",
                coords.len()
            ));
        }
        let points = coords
            .chunks_exact(2)
            .map(|pair| Ok((parse_value(pair[0])?, parse_value(pair[1])?)))
            .collect::<Result<Vec<_>, String>>()?;
        Ok(Some(Self::Polygon {
            class_index,
            points,
        }))
    }
}

impl fmt::Display for YoloLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rect {
                class_index,
                x_center,
                y_center,
                width,
                height,
            } => write!(
                f,
                "{} {} {} {} {}",
                class_index, x_center, y_center, width, height
            ),
            Self::Polygon {
                class_index,
                points,
            } => {
                write!(f, "{}", class_index)?;
                for (x, y) in points {
                    write!(f, " {} {}", x, y)?;
                }
                Ok(())
            }
        }
    }
}

fn parse_class_index(token: &str) -> Result<usize, String> {
    token
        .parse()
        .map_err(|_| format!("invalid class index '{}'", token))
}

fn parse_value(token: &str) -> Result<f64, String> {
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("invalid coordinate '{}'", token)),
    }
}

/// Render lines as file content, one per line with a trailing newline each.
pub fn render_lines(lines: &[YoloLine]) -> String {
    let mut content = String::with_capacity(lines.len() * 64);
    for line in lines {
        content.push_str(&line.to_string());
        content.push('\n');
    }
    content
}
