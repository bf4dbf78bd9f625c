use serde::{Deserialize, Serialize};

/// 1-D lookup with linear interpolation, clamped at both ends.
/// Breakpoints must be strictly increasing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table1D {
    rows: Vec<(f64, f64)>,
}

impl Table1D {
    pub fn new(rows: Vec<(f64, f64)>) -> Self {
        debug_assert!(rows.windows(2).all(|w| w[0].0 < w[1].0));
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn lookup(&self, x: f64) -> f64 {
        match self.rows.len() {
            0 => 0.0,
            1 => self.rows[0].1,
            _ => {
                let first = self.rows.first().unwrap();
                let last = self.rows.last().unwrap();
                if x <= first.0 {
                    return first.1;
                }
                if x >= last.0 {
                    return last.1;
                }
                let i = self.rows.partition_point(|r| r.0 <= x) - 1;
                let (x0, y0) = self.rows[i];
                let (x1, y1) = self.rows[i + 1];
                y0 + (y1 - y0) * (x - x0) / (x1 - x0)
            }
        }
    }
}

/// 2-D lookup with bilinear interpolation, clamped at the table edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table2D {
    row_breaks: Vec<f64>,
    col_breaks: Vec<f64>,
    /// data[row][col]
    data: Vec<Vec<f64>>,
}

impl Table2D {
    pub fn new(row_breaks: Vec<f64>, col_breaks: Vec<f64>, data: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(data.len(), row_breaks.len());
        debug_assert!(data.iter().all(|r| r.len() == col_breaks.len()));
        Self {
            row_breaks,
            col_breaks,
            data,
        }
    }

    fn bracket(breaks: &[f64], x: f64) -> (usize, f64) {
        if breaks.len() < 2 || x <= breaks[0] {
            return (0, 0.0);
        }
        if x >= *breaks.last().unwrap() {
            return (breaks.len() - 2, 1.0);
        }
        let i = breaks.partition_point(|&b| b <= x) - 1;
        let t = (x - breaks[i]) / (breaks[i + 1] - breaks[i]);
        (i, t)
    }

    pub fn lookup(&self, row: f64, col: f64) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        if self.data.len() == 1 {
            let (j, tj) = Self::bracket(&self.col_breaks, col);
            let r = &self.data[0];
            if r.len() == 1 {
                return r[0];
            }
            return r[j] + (r[j + 1] - r[j]) * tj;
        }
        let (i, ti) = Self::bracket(&self.row_breaks, row);
        let (j, tj) = Self::bracket(&self.col_breaks, col);
        if self.col_breaks.len() == 1 {
            let a = self.data[i][0];
            let b = self.data[i + 1][0];
            return a + (b - a) * ti;
        }
        let q00 = self.data[i][j];
        let q01 = self.data[i][j + 1];
        let q10 = self.data[i + 1][j];
        let q11 = self.data[i + 1][j + 1];
        let top = q00 + (q01 - q00) * tj;
        let bot = q10 + (q11 - q10) * tj;
        top + (bot - top) * ti
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn interpolates_and_clamps_1d() {
        let t = Table1D::new(vec![(-1.0, -0.5), (0.0, 0.0), (2.0, 1.0)]);
        assert_relative_eq!(t.lookup(-2.0), -0.5);
        assert_relative_eq!(t.lookup(-0.5), -0.25);
        assert_relative_eq!(t.lookup(1.0), 0.5);
        assert_relative_eq!(t.lookup(3.0), 1.0);
    }

    #[test]
    fn single_row_is_constant() {
        let t = Table1D::new(vec![(0.0, 4.2)]);
        assert_relative_eq!(t.lookup(-10.0), 4.2);
        assert_relative_eq!(t.lookup(10.0), 4.2);
    }

    #[test]
    fn bilinear_center() {
        let t = Table2D::new(
            vec![0.0, 1.0],
            vec![0.0, 1.0],
            vec![vec![0.0, 1.0], vec![2.0, 3.0]],
        );
        assert_relative_eq!(t.lookup(0.5, 0.5), 1.5);
        assert_relative_eq!(t.lookup(0.0, 1.0), 1.0);
        assert_relative_eq!(t.lookup(1.0, 0.0), 2.0);
        // clamped corners
        assert_relative_eq!(t.lookup(-1.0, -1.0), 0.0);
        assert_relative_eq!(t.lookup(2.0, 2.0), 3.0);
    }
}
